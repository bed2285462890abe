//! Run the cage control loop against the configured bench.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cage::{CageConfig, CageController, SensorSource};
use clap::Parser;
use control::Axis;
use hardware::coil::CoilPort;
use hardware::mdl::{MdlEvent, MdlLink};
use hardware::mfg::{MfgEvent, MfgLink, SampleRate};
use tracing::{info, trace, warn};

#[derive(Parser)]
#[command(about = "Run the field cage control loop")]
struct Args {
    /// Bench configuration file. Defaults apply if the file is absent.
    #[arg(long, default_value = "cage.json")]
    config: PathBuf,

    /// Use the MDL station at this address as the sensor source.
    #[arg(long)]
    mdl_addr: Option<String>,

    /// Use the MFG-3 on this serial port as the sensor source.
    #[arg(long, conflicts_with = "mdl_addr")]
    mfg_port: Option<String>,

    /// Per-axis field setpoints.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    setpoint: Option<Vec<f64>>,

    /// How long to run before shutting down.
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = if args.config.exists() {
        CageConfig::load(&args.config)
            .with_context(|| format!("loading config {:?}", args.config))?
    } else {
        info!("no config at {:?}, using defaults", args.config);
        CageConfig::default()
    };
    if let Some(addr) = args.mdl_addr {
        config.mdl.addr = addr;
        config.source = SensorSource::Mdl;
    }
    if let Some(port) = args.mfg_port {
        config.mfg.port = port;
        config.source = SensorSource::Mfg;
    }

    let coil_port: Box<dyn CoilPort + Send> = match &config.coil.port {
        Some(name) => Box::new(
            serialport::new(name.as_str(), config.coil.baud)
                .timeout(Duration::from_millis(500))
                .open()
                .with_context(|| format!("opening coil port {name}"))?,
        ),
        None => {
            warn!("no coil port configured; command frames will be discarded");
            Box::new(std::io::sink())
        }
    };

    let controller = Arc::new(CageController::new(&config, coil_port));
    controller.set_observer(Box::new(|update| {
        trace!(
            "{} filtered {:.1} error {:.1}",
            update.axis,
            update.filtered,
            update.error
        );
    }));
    if let Some(setpoint) = &args.setpoint {
        for axis in Axis::ALL {
            controller.set_setpoint(axis, setpoint[axis.index()]);
        }
        info!("setpoints: {:?}", controller.setpoints());
    }

    // Sensor reader feeding the controller.
    let consumer = controller.clone();
    let (mut mfg_link, mut mdl_reader) = (None, None);
    let feed = match config.source {
        SensorSource::Mdl => {
            let mut link = MdlLink::connect(&config.mdl.addr)
                .with_context(|| format!("connecting to MDL at {}", config.mdl.addr))?;
            link.set_timeout(Duration::from_millis(config.mdl.timeout_ms))?;
            let (reader, rx) = link.into_reader();
            mdl_reader = Some(reader);
            std::thread::spawn(move || {
                for event in rx {
                    match event {
                        MdlEvent::Record(record) => consumer.ingest_record(&record),
                        MdlEvent::Closed(e) => {
                            warn!("MDL link closed: {e}");
                            break;
                        }
                    }
                }
            })
        }
        SensorSource::Mfg => {
            let (mut link, rx) = MfgLink::open(&config.mfg.port, config.mfg.baud)
                .with_context(|| format!("opening MFG port {}", config.mfg.port))?;
            if let Some(rate) = SampleRate::from_code(config.mfg.rate_code) {
                link.set_sample_rate(rate)?;
                info!("MFG sampling at {} Hz", rate.frequency_hz());
            }
            mfg_link = Some(link);
            std::thread::spawn(move || {
                for event in rx {
                    match event {
                        MfgEvent::Sample(sample) => consumer.ingest_sample(sample),
                        MfgEvent::Closed(e) => {
                            warn!("MFG link closed: {e}");
                            break;
                        }
                    }
                }
            })
        }
    };

    controller.start();
    info!("running for {} s", args.duration_secs);
    std::thread::sleep(Duration::from_secs(args.duration_secs));

    controller.stop();
    if let Some(mut link) = mfg_link {
        link.close();
    }
    if let Some(mut reader) = mdl_reader {
        reader.stop();
    }
    let _ = feed.join();

    info!("final outputs: {:?}", controller.outputs());
    Ok(())
}
