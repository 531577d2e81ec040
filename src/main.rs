use std::sync;
use std::sync::atomic;
use std::sync::mpsc;
use std::thread;
use std::time;

use slog::Drain;
use slog_scope::{error, info};
use structopt::StructOpt;

mod climate;
mod config;
mod model;
mod moisture;
mod pumps;
mod store;
mod ui;
mod util;

/// Queued refresh requests. Overflow is dropped; a repaint is idempotent.
const EVENT_QUEUE_DEPTH: usize = 16;
const SERIAL_TIMEOUT: time::Duration = time::Duration::from_millis(200);

#[derive(Debug, StructOpt)]
#[structopt(
    name = "sprout",
    about = "Single-plant soil monitoring and watering station"
)]
struct Options {
    /// Configuration file to use instead of the default lookup.
    #[structopt(long = "config", parse(from_os_str))]
    config: Option<std::path::PathBuf>,
}

fn main() -> Result<(), failure::Error> {
    let options = Options::from_args();
    let _logging = init_logging()?;

    let settings = config::Settings::load(options.config.as_deref())?;
    let plant = sync::Arc::new(model::Plant::from_settings(&settings));
    let store = sync::Arc::new(store::Store::new([plant.name.clone()]));
    let stop = sync::Arc::new(atomic::AtomicBool::new(false));

    // Both hardware handles are claimed before any loop starts; a missing
    // line or device aborts startup.
    let line = pumps::GpioLine::open(settings.pump.pin)?;
    let pump = pumps::Pump::new(line, time::Duration::from_secs(settings.pump.duration_secs));

    let port = serialport::new(settings.serial.device.as_str(), settings.serial.baud_rate)
        .timeout(SERIAL_TIMEOUT)
        .open()?;

    let (event_tx, event_rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);

    let moisture_handle = {
        let reader = moisture::MoistureReader::new(
            plant.clone(),
            store.clone(),
            pump,
            event_tx.clone(),
            time::Duration::from_secs(settings.serial.poll_interval_secs),
        );
        let stop = stop.clone();
        thread::Builder::new()
            .name("moisture-reader".to_owned())
            .spawn(move || {
                if let Err(e) = reader.run(port, &stop) {
                    error!("moisture reader failed: {}", e);
                }
            })?
    };

    let climate_handle = {
        let mut reader = climate::ClimateReader::new(
            plant.clone(),
            store.clone(),
            climate::Dht22::new(settings.climate.pin),
            event_tx,
            time::Duration::from_secs(settings.climate.poll_interval_secs),
        );
        let stop = stop.clone();
        thread::Builder::new()
            .name("climate-reader".to_owned())
            .spawn(move || reader.run(&stop))?
    };

    info!("started");

    ui::run(store, event_rx)?;

    // The window is gone; wind the readers down. Dropping the pump line
    // leaves it low.
    stop.store(true, atomic::Ordering::SeqCst);
    if moisture_handle.join().is_err() {
        error!("moisture reader panicked");
    }
    if climate_handle.join().is_err() {
        error!("climate reader panicked");
    }

    info!("shut down cleanly");

    Ok(())
}

fn init_logging() -> Result<slog_scope::GlobalLoggerGuard, failure::Error> {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(drain, slog::o!());

    let guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init()?;

    Ok(guard)
}
