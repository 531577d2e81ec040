use std::io;
use std::io::Read;
use std::sync;
use std::sync::atomic;
use std::sync::mpsc;
use std::time;

use slog_scope::{debug, error, info, warn};

use crate::model;
use crate::pumps;
use crate::store;
use crate::util;

/// Full-scale code reported by the probe. Lower codes are wetter.
pub const RAW_FULL_SCALE: i64 = 1023;

pub fn moisture_percent(raw: i64) -> f64 {
    (RAW_FULL_SCALE - raw) as f64 / RAW_FULL_SCALE as f64 * 100.0
}

/// Polls the soil probe, appends percentages to the plant's history and
/// waters when the raw code drops below the plant threshold. Watering blocks
/// the loop for the pump duration, so two waterings can never overlap.
pub struct MoistureReader<L> {
    plant: sync::Arc<model::Plant>,
    store: sync::Arc<store::Store>,
    pump: pumps::Pump<L>,
    events: mpsc::SyncSender<store::Event>,
    poll_interval: time::Duration,
}

impl<L> MoistureReader<L>
where
    L: pumps::Line,
{
    pub fn new(
        plant: sync::Arc<model::Plant>,
        store: sync::Arc<store::Store>,
        pump: pumps::Pump<L>,
        events: mpsc::SyncSender<store::Event>,
        poll_interval: time::Duration,
    ) -> MoistureReader<L> {
        MoistureReader {
            plant,
            store,
            pump,
            events,
            poll_interval,
        }
    }

    /// Runs until `stop` is raised. A hard read error on the device ends the
    /// loop; the port being quiet does not.
    pub fn run(
        &self,
        mut port: Box<dyn serialport::SerialPort>,
        stop: &atomic::AtomicBool,
    ) -> Result<(), failure::Error> {
        let mut pending = Vec::new();

        for _ in util::every("moisture", self.poll_interval, stop) {
            self.poll(&mut port, &mut pending)?;
        }

        Ok(())
    }

    fn poll(
        &self,
        port: &mut Box<dyn serialport::SerialPort>,
        pending: &mut Vec<u8>,
    ) -> Result<(), failure::Error> {
        let available = port.bytes_to_read()?;
        if available == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; available as usize];
        match port.read(&mut chunk) {
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        for frame in split_frames(pending) {
            self.handle_frame(&frame);
        }

        Ok(())
    }

    /// One complete frame from the probe: a decimal raw moisture code.
    fn handle_frame(&self, frame: &str) {
        if frame.is_empty() {
            return;
        }

        let raw: i64 = match frame.parse() {
            Ok(raw) if (0..=RAW_FULL_SCALE).contains(&raw) => raw,
            _ => {
                warn!("dropping malformed probe frame {:?}", frame);
                return;
            }
        };

        let percent = moisture_percent(raw);
        self.store.push_moisture(&self.plant.name, percent);
        info!("moisture for {}: {:.1}%", self.plant.name, percent);

        if raw < self.plant.moisture_threshold {
            self.water();
        }

        let event = store::Event::Moisture {
            plant: self.plant.name.clone(),
        };
        if let Err(e) = self.events.try_send(event) {
            debug!("dropping refresh event: {}", e);
        }
    }

    fn water(&self) {
        info!("watering {}...", self.plant.name);
        self.store.set_watering(&self.plant.name, true);

        match self.pump.activate() {
            Ok(true) => {
                self.store.mark_watered(&self.plant.name);
                info!("watering {} complete", self.plant.name);
            }
            Ok(false) => {}
            Err(e) => error!("pump failed while watering {}: {}", self.plant.name, e),
        }

        self.store.set_watering(&self.plant.name, false);
    }
}

/// Splits complete newline-terminated frames off the front of `pending`,
/// leaving any partial trailing frame for the next poll.
fn split_frames(pending: &mut Vec<u8>) -> Vec<String> {
    let mut frames = Vec::new();

    while let Some(end) = pending.iter().position(|&b| b == b'\n') {
        let frame: Vec<u8> = pending.drain(..=end).collect();
        frames.push(String::from_utf8_lossy(&frame).trim().to_owned());
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Line that counts activations instead of toggling hardware.
    #[derive(Clone, Default)]
    struct FakeLine {
        high: sync::Arc<AtomicBool>,
        activations: sync::Arc<AtomicUsize>,
    }

    impl pumps::Line for FakeLine {
        fn is_high(&self) -> Result<bool, failure::Error> {
            Ok(self.high.load(Ordering::SeqCst))
        }

        fn set_high(&self, high: bool) -> Result<(), failure::Error> {
            self.high.store(high, Ordering::SeqCst);
            if high {
                self.activations.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct Fixture {
        reader: MoistureReader<FakeLine>,
        line: FakeLine,
        store: sync::Arc<store::Store>,
        events: mpsc::Receiver<store::Event>,
    }

    fn fixture(threshold: i64) -> Fixture {
        let plant = sync::Arc::new(model::Plant {
            name: "Plant A".to_owned(),
            moisture_threshold: threshold,
        });
        let store = sync::Arc::new(store::Store::new(["Plant A"]));
        let line = FakeLine::default();
        let pump = pumps::Pump::new(line.clone(), time::Duration::from_secs(0));
        let (tx, rx) = mpsc::sync_channel(16);
        let reader = MoistureReader::new(
            plant,
            store.clone(),
            pump,
            tx,
            time::Duration::from_secs(1),
        );

        Fixture {
            reader,
            line,
            store,
            events: rx,
        }
    }

    #[test]
    fn percent_is_monotonically_non_increasing() {
        assert_eq!(moisture_percent(0), 100.0);
        assert_eq!(moisture_percent(RAW_FULL_SCALE), 0.0);

        for raw in 0..RAW_FULL_SCALE {
            assert!(moisture_percent(raw) >= moisture_percent(raw + 1));
        }
    }

    #[test]
    fn breach_triggers_exactly_one_activation() {
        let f = fixture(300);

        f.reader.handle_frame("250");
        assert_eq!(f.line.activations.load(Ordering::SeqCst), 1);

        f.reader.handle_frame("500");
        assert_eq!(f.line.activations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_frames_are_dropped_without_affecting_history() {
        let f = fixture(0);

        for frame in ["abc", "500", "", "12.5", "600", "-4", "2000", "700"] {
            f.reader.handle_frame(frame);
        }

        assert_eq!(f.store.moisture("Plant A").len(), 3);
    }

    #[test]
    fn drying_stream_waters_on_each_breach() {
        let f = fixture(300);
        let mut pending = b"310\n295\n280\n".to_vec();

        for frame in split_frames(&mut pending) {
            f.reader.handle_frame(&frame);
        }

        let history = f.store.moisture("Plant A");
        let expected = [69.70, 71.16, 72.63];
        assert_eq!(history.len(), expected.len());
        for (actual, expected) in history.iter().zip(expected) {
            assert!((actual - expected).abs() < 0.05, "got {}", actual);
        }

        // Only 295 and 280 breach the threshold.
        assert_eq!(f.line.activations.load(Ordering::SeqCst), 2);

        let status = f.store.pump_status("Plant A");
        assert!(!status.watering);
        assert!(status.last_watered.is_some());
    }

    #[test]
    fn each_sample_emits_a_refresh_event() {
        let f = fixture(0);

        f.reader.handle_frame("400");
        f.reader.handle_frame("bogus");
        f.reader.handle_frame("410");

        let drained: Vec<store::Event> = f.events.try_iter().collect();
        let expected = store::Event::Moisture {
            plant: "Plant A".to_owned(),
        };
        assert_eq!(drained, vec![expected.clone(), expected]);
    }

    #[test]
    fn partial_frames_wait_for_their_terminator() {
        let mut pending = b"12".to_vec();
        assert!(split_frames(&mut pending).is_empty());

        pending.extend_from_slice(b"3\n45");
        assert_eq!(split_frames(&mut pending), vec!["123".to_owned()]);
        assert_eq!(pending, b"45");
    }
}
