use std::thread;
use std::time;

use slog_scope::{error, info};

/// A digital output line. Bit 0 = off, 1 = on.
pub trait Line: Send {
    fn is_high(&self) -> Result<bool, failure::Error>;
    fn set_high(&self, high: bool) -> Result<(), failure::Error>;
}

/// Sysfs-backed GPIO line, requested exclusively for the process lifetime.
pub struct GpioLine {
    pin: sysfs_gpio::Pin,
}

impl GpioLine {
    /// Exports the pin and drives it low. Fails fast so a missing line is
    /// caught before any polling loop starts.
    pub fn open(pin: u64) -> Result<GpioLine, failure::Error> {
        let pin = sysfs_gpio::Pin::new(pin);
        pin.export()?;
        pin.set_direction(sysfs_gpio::Direction::Low)?;

        Ok(GpioLine { pin })
    }
}

impl Line for GpioLine {
    fn is_high(&self) -> Result<bool, failure::Error> {
        let result = self.pin.get_value()? != 0;
        Ok(result)
    }

    fn set_high(&self, high: bool) -> Result<(), failure::Error> {
        self.pin.set_value(if high { 1 } else { 0 })?;
        Ok(())
    }
}

impl Drop for GpioLine {
    fn drop(&mut self) {
        // The pump must be off on every exit path.
        if let Err(e) = self.pin.set_value(0) {
            error!("Could not drive pin {} low: {}", self.pin.get_pin(), e);
        }
        if let Err(e) = self.pin.unexport() {
            error!("Could not unexport pin {}: {}", self.pin.get_pin(), e);
        }
    }
}

/// Turns the line on for a fixed duration, then off again. Re-entry while
/// the line is already on is skipped and logged. The line check and the
/// switch-on are not atomic; the moisture reader is the only caller.
pub struct Pump<L> {
    line: L,
    duration: time::Duration,
}

impl<L> Pump<L>
where
    L: Line,
{
    pub fn new(line: L, duration: time::Duration) -> Pump<L> {
        Pump { line, duration }
    }

    /// Returns whether the pump actually ran. Blocks for the full watering
    /// duration when it does.
    pub fn activate(&self) -> Result<bool, failure::Error> {
        if self.line.is_high()? {
            info!("pump is already on, skipping watering");
            return Ok(false);
        }

        self.line.set_high(true)?;
        thread::sleep(self.duration);
        self.line.set_high(false)?;

        Ok(true)
    }
}
