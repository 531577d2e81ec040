use std::sync;
use std::sync::atomic;
use std::sync::mpsc;
use std::time;

use slog_scope::{debug, info, warn};

use crate::model;
use crate::store;
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
}

/// Combined temperature/humidity sensor. A read may legitimately fail; the
/// single-wire protocol is timing sensitive.
pub trait ClimateSensor: Send {
    fn sample(&mut self) -> Result<ClimateReading, failure::Error>;
}

/// DHT22 on a BCM pin.
pub struct Dht22 {
    pin: u8,
}

impl Dht22 {
    pub fn new(pin: u8) -> Dht22 {
        Dht22 { pin }
    }
}

impl ClimateSensor for Dht22 {
    fn sample(&mut self) -> Result<ClimateReading, failure::Error> {
        let reading = dht22_pi::read(self.pin)
            .map_err(|e| failure::format_err!("DHT22 read on pin {} failed: {:?}", self.pin, e))?;

        Ok(ClimateReading {
            temperature: f64::from(reading.temperature),
            humidity: f64::from(reading.humidity),
        })
    }
}

/// Appends a climate sample to the plant's histories once per poll interval.
/// Failed reads append nothing; the next tick is the retry.
pub struct ClimateReader<S> {
    plant: sync::Arc<model::Plant>,
    store: sync::Arc<store::Store>,
    sensor: S,
    events: mpsc::SyncSender<store::Event>,
    poll_interval: time::Duration,
}

impl<S> ClimateReader<S>
where
    S: ClimateSensor,
{
    pub fn new(
        plant: sync::Arc<model::Plant>,
        store: sync::Arc<store::Store>,
        sensor: S,
        events: mpsc::SyncSender<store::Event>,
        poll_interval: time::Duration,
    ) -> ClimateReader<S> {
        ClimateReader {
            plant,
            store,
            sensor,
            events,
            poll_interval,
        }
    }

    pub fn run(&mut self, stop: &atomic::AtomicBool) {
        for _ in util::every("climate", self.poll_interval, stop) {
            self.poll();
        }
    }

    fn poll(&mut self) {
        match self.sensor.sample() {
            Ok(reading) => {
                self.store
                    .push_climate(&self.plant.name, reading.temperature, reading.humidity);
                info!(
                    "climate for {}: {:.1}°C, {:.1}% humidity",
                    self.plant.name, reading.temperature, reading.humidity
                );

                let event = store::Event::Climate {
                    plant: self.plant.name.clone(),
                };
                if let Err(e) = self.events.try_send(event) {
                    debug!("dropping refresh event: {}", e);
                }
            }
            Err(e) => warn!("climate sample failed, retrying next tick: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections;

    /// Replays a fixed sequence of sensor outcomes.
    struct ScriptedSensor {
        outcomes: collections::VecDeque<Result<ClimateReading, failure::Error>>,
    }

    impl ScriptedSensor {
        fn new<I>(outcomes: I) -> ScriptedSensor
        where
            I: IntoIterator<Item = Result<ClimateReading, failure::Error>>,
        {
            ScriptedSensor {
                outcomes: outcomes.into_iter().collect(),
            }
        }
    }

    impl ClimateSensor for ScriptedSensor {
        fn sample(&mut self) -> Result<ClimateReading, failure::Error> {
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(failure::err_msg("script exhausted")))
        }
    }

    fn reading(temperature: f64, humidity: f64) -> Result<ClimateReading, failure::Error> {
        Ok(ClimateReading {
            temperature,
            humidity,
        })
    }

    fn fixture(
        sensor: ScriptedSensor,
    ) -> (
        ClimateReader<ScriptedSensor>,
        sync::Arc<store::Store>,
        mpsc::Receiver<store::Event>,
    ) {
        let plant = sync::Arc::new(model::Plant {
            name: "Plant A".to_owned(),
            moisture_threshold: 300,
        });
        let store = sync::Arc::new(store::Store::new(["Plant A"]));
        let (tx, rx) = mpsc::sync_channel(16);
        let reader = ClimateReader::new(
            plant,
            store.clone(),
            sensor,
            tx,
            time::Duration::from_secs(5),
        );

        (reader, store, rx)
    }

    #[test]
    fn successful_sample_appends_to_both_histories() {
        let (mut reader, store, events) = fixture(ScriptedSensor::new([reading(21.5, 48.0)]));

        reader.poll();

        assert_eq!(store.temperature("Plant A"), vec![21.5]);
        assert_eq!(store.humidity("Plant A"), vec![48.0]);
        let drained: Vec<store::Event> = events.try_iter().collect();
        assert_eq!(
            drained,
            vec![store::Event::Climate {
                plant: "Plant A".to_owned()
            }]
        );
    }

    #[test]
    fn failed_sample_leaves_both_histories_unchanged() {
        let (mut reader, store, events) =
            fixture(ScriptedSensor::new([Err(failure::err_msg("checksum"))]));

        reader.poll();

        assert!(store.temperature("Plant A").is_empty());
        assert!(store.humidity("Plant A").is_empty());
        assert!(events.try_iter().next().is_none());
    }

    #[test]
    fn failures_interleaved_with_samples_keep_the_series_aligned() {
        let (mut reader, store, _events) = fixture(ScriptedSensor::new([
            reading(20.0, 50.0),
            Err(failure::err_msg("timeout")),
            reading(21.0, 49.0),
        ]));

        reader.poll();
        reader.poll();
        reader.poll();

        assert_eq!(store.temperature("Plant A"), vec![20.0, 21.0]);
        assert_eq!(store.humidity("Plant A"), vec![50.0, 49.0]);
        assert_eq!(store.latest_climate("Plant A"), Some((21.0, 49.0)));
    }
}
