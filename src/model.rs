use crate::config;

/// Runtime description of the monitored plant, resolved from settings before
/// any loop starts.
#[derive(Debug, Clone)]
pub struct Plant {
    pub name: String,
    pub moisture_threshold: i64,
}

impl Plant {
    pub fn from_settings(settings: &config::Settings) -> Plant {
        Plant {
            name: settings.plant.name.clone(),
            moisture_threshold: settings.plant.moisture_threshold,
        }
    }
}
