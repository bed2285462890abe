//! Dump the record stream from an MDL station to the log.

use anyhow::Result;
use clap::Parser;
use hardware::mdl::{MdlError, MdlLink, RecordKind};
use tracing::{info, warn};

#[derive(Parser)]
#[command(about = "Print MDL records as they arrive")]
struct Args {
    /// Station address, e.g. 192.168.1.50:4001.
    addr: String,

    /// Stop after this many records (0 = run until the peer closes).
    #[arg(long, default_value_t = 0)]
    count: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("Connecting to MDL station at {}...", args.addr);
    let mut link = MdlLink::connect(&args.addr)?;

    let mut seen = 0u64;
    loop {
        match link.read_record() {
            Ok(record) => {
                match record.record_kind() {
                    Some(RecordKind::Measurement) => {
                        let field = record.sensor_a_field().unwrap_or_default();
                        let temps = record.temperatures().unwrap_or_default();
                        info!(
                            t = record.unix_seconds().unwrap_or_default(),
                            "measurement: field {:?} nT, temps {:?} C", field, temps
                        );
                    }
                    Some(RecordKind::GpsPosition) => {
                        let (lat, lon) = record.lat_lon().unwrap_or_default();
                        info!("gps fix: {lat:.5}, {lon:.5}");
                    }
                    Some(kind) => info!("{kind}: ints {:?}", record.ints),
                    None => warn!("unknown record kind {}", record.kind),
                }
                seen += 1;
                if args.count != 0 && seen >= args.count {
                    break;
                }
            }
            Err(MdlError::Timeout) => continue,
            Err(MdlError::ConnectionClosed) => {
                info!("station closed the connection after {seen} records");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
