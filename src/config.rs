use std::path;

use serde_derive::Deserialize;

/// Runtime settings. Every field has a compiled-in default matching the
/// station hardware, so running without a config file is the common case.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub plant: Plant,
    pub serial: Serial,
    pub pump: Pump,
    pub climate: Climate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Plant {
    pub name: String,
    /// Raw probe codes below this trigger a watering. Lower codes are wetter.
    pub moisture_threshold: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Serial {
    pub device: String,
    pub baud_rate: u32,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pump {
    pub pin: u64,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Climate {
    pub pin: u8,
    pub poll_interval_secs: u64,
}

impl Settings {
    /// Merges the optional config file and `SPROUT_*` environment overrides
    /// over the defaults.
    pub fn load(path: Option<&path::Path>) -> Result<Settings, failure::Error> {
        let mut settings = config::Config::new();

        match path {
            Some(path) => {
                settings.merge(config::File::from(path))?;
            }
            None => {
                settings.merge(config::File::with_name("sprout").required(false))?;
            }
        }
        settings.merge(config::Environment::with_prefix("sprout").separator("_"))?;

        Ok(settings.try_into()?)
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            plant: Plant::default(),
            serial: Serial::default(),
            pump: Pump::default(),
            climate: Climate::default(),
        }
    }
}

impl Default for Plant {
    fn default() -> Plant {
        Plant {
            name: "Plant A".to_owned(),
            moisture_threshold: 300,
        }
    }
}

impl Default for Serial {
    fn default() -> Serial {
        Serial {
            device: "/dev/ttyUSB0".to_owned(),
            baud_rate: 9600,
            poll_interval_secs: 1,
        }
    }
}

impl Default for Pump {
    fn default() -> Pump {
        Pump {
            pin: 17,
            duration_secs: 3,
        }
    }
}

impl Default for Climate {
    fn default() -> Climate {
        Climate {
            pin: 4,
            poll_interval_secs: 5,
        }
    }
}
