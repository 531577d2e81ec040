use std::collections;
use std::sync;

/// Refresh requests flowing from the reader threads to the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Moisture { plant: String },
    Climate { plant: String },
}

/// Pump state as the display sees it. `watering` is raised for the duration
/// of an activation; `last_watered` survives until the next one.
#[derive(Debug, Clone, Default)]
pub struct PumpStatus {
    pub watering: bool,
    pub last_watered: Option<chrono::DateTime<chrono::Local>>,
}

/// In-memory histories for every plant, created empty at startup and
/// discarded on exit. Each map has exactly one writer thread; the UI clones
/// snapshots out and never observes a partial append.
pub struct Store {
    moisture: sync::Mutex<collections::HashMap<String, Vec<f64>>>,
    temperature: sync::Mutex<collections::HashMap<String, Vec<f64>>>,
    humidity: sync::Mutex<collections::HashMap<String, Vec<f64>>>,
    pumps: sync::Mutex<collections::HashMap<String, PumpStatus>>,
}

impl Store {
    pub fn new<I>(plants: I) -> Store
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let names: Vec<String> = plants.into_iter().map(Into::into).collect();
        let series = || {
            names
                .iter()
                .map(|name| (name.clone(), Vec::new()))
                .collect()
        };

        Store {
            moisture: sync::Mutex::new(series()),
            temperature: sync::Mutex::new(series()),
            humidity: sync::Mutex::new(series()),
            pumps: sync::Mutex::new(
                names
                    .iter()
                    .map(|name| (name.clone(), PumpStatus::default()))
                    .collect(),
            ),
        }
    }

    pub fn plants(&self) -> Vec<String> {
        let mut names: Vec<String> = self.moisture.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn push_moisture(&self, plant: &str, percent: f64) {
        self.moisture
            .lock()
            .unwrap()
            .entry(plant.to_owned())
            .or_default()
            .push(percent);
    }

    pub fn moisture(&self, plant: &str) -> Vec<f64> {
        self.moisture
            .lock()
            .unwrap()
            .get(plant)
            .cloned()
            .unwrap_or_default()
    }

    pub fn push_climate(&self, plant: &str, temperature: f64, humidity: f64) {
        self.temperature
            .lock()
            .unwrap()
            .entry(plant.to_owned())
            .or_default()
            .push(temperature);
        self.humidity
            .lock()
            .unwrap()
            .entry(plant.to_owned())
            .or_default()
            .push(humidity);
    }

    pub fn temperature(&self, plant: &str) -> Vec<f64> {
        self.temperature
            .lock()
            .unwrap()
            .get(plant)
            .cloned()
            .unwrap_or_default()
    }

    pub fn humidity(&self, plant: &str) -> Vec<f64> {
        self.humidity
            .lock()
            .unwrap()
            .get(plant)
            .cloned()
            .unwrap_or_default()
    }

    pub fn latest_climate(&self, plant: &str) -> Option<(f64, f64)> {
        let temperature = self.temperature(plant).last().copied();
        let humidity = self.humidity(plant).last().copied();
        match (temperature, humidity) {
            (Some(temperature), Some(humidity)) => Some((temperature, humidity)),
            _ => None,
        }
    }

    pub fn set_watering(&self, plant: &str, watering: bool) {
        self.pumps
            .lock()
            .unwrap()
            .entry(plant.to_owned())
            .or_default()
            .watering = watering;
    }

    pub fn mark_watered(&self, plant: &str) {
        self.pumps
            .lock()
            .unwrap()
            .entry(plant.to_owned())
            .or_default()
            .last_watered = Some(chrono::Local::now());
    }

    pub fn pump_status(&self, plant: &str) -> PumpStatus {
        self.pumps
            .lock()
            .unwrap()
            .get(plant)
            .cloned()
            .unwrap_or_default()
    }
}
