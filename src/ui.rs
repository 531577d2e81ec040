use std::sync;
use std::sync::mpsc;
use std::time;

use iced::widget::{column, pick_list, row, text};
use iced::{Alignment, Color, Element, Length, Size, Subscription, Task};
use plotters::prelude::*;
use plotters::style::Color as _;
use plotters_iced::{Chart, ChartWidget, DrawingBackend};

use crate::store;

const WINDOW_WIDTH: f32 = 1000.0;
const WINDOW_HEIGHT: f32 = 600.0;
/// Samples shown by the short-term pane.
const SHORT_TERM_WINDOW: usize = 10;
/// How often the event channel is drained.
const DRAIN_INTERVAL: time::Duration = time::Duration::from_millis(250);

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    PlantSelected(String),
}

/// Foreground application state. Everything rendered comes from the snapshot
/// fields, refreshed from the store whenever a reader announced new samples.
struct App {
    store: sync::Arc<store::Store>,
    events: mpsc::Receiver<store::Event>,

    plants: Vec<String>,
    selected: Option<String>,

    moisture: Vec<f64>,
    climate: Option<(f64, f64)>,
    pump: store::PumpStatus,
}

impl App {
    fn new(store: sync::Arc<store::Store>, events: mpsc::Receiver<store::Event>) -> App {
        let plants = store.plants();
        let selected = plants.first().cloned();

        let mut app = App {
            store,
            events,
            plants,
            selected,
            moisture: Vec::new(),
            climate: None,
            pump: store::PumpStatus::default(),
        };
        app.refresh();
        app
    }

    fn title(&self) -> String {
        "Smart Plant Monitoring System".to_owned()
    }

    /// Copies the selected plant's state out of the store. The histories may
    /// keep growing behind this snapshot; the next refresh catches up.
    fn refresh(&mut self) {
        if let Some(plant) = self.selected.clone() {
            self.moisture = self.store.moisture(&plant);
            self.climate = self.store.latest_climate(&plant);
            self.pump = self.store.pump_status(&plant);
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                let mut dirty = false;
                while let Ok(event) = self.events.try_recv() {
                    let plant = match event {
                        store::Event::Moisture { plant } => plant,
                        store::Event::Climate { plant } => plant,
                    };
                    if self.selected.as_deref() == Some(plant.as_str()) {
                        dirty = true;
                    }
                }
                if dirty {
                    self.refresh();
                }
            }

            Message::PlantSelected(plant) => {
                self.selected = Some(plant);
                self.refresh();
            }
        }

        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let title = text("Plant Monitoring System").size(24.0);

        let selector = pick_list(
            self.plants.clone(),
            self.selected.clone(),
            Message::PlantSelected,
        )
        .width(Length::Fixed(160.0));

        let (offset, short_term) = tail(&self.moisture, SHORT_TERM_WINDOW);
        let short_chart: Element<'_, Message> = ChartWidget::new(MoistureChart {
            title: "Soil Moisture Levels (Short-Term)",
            samples: short_term,
            x_offset: offset,
        })
        .width(Length::Fixed(470.0))
        .height(Length::Fixed(380.0))
        .into();

        let long_chart: Element<'_, Message> = ChartWidget::new(MoistureChart {
            title: "Long-Term Soil Moisture Levels",
            samples: &self.moisture,
            x_offset: 0,
        })
        .width(Length::Fixed(470.0))
        .height(Length::Fixed(380.0))
        .into();

        let temperature_text = match self.climate {
            Some((temperature, _)) => format!("Temperature: {:.1}°C", temperature),
            None => "Temperature: N/A".to_owned(),
        };
        let humidity_text = match self.climate {
            Some((_, humidity)) => format!("Humidity: {:.1}%", humidity),
            None => "Humidity: N/A".to_owned(),
        };

        let green = Color::from_rgb8(0, 150, 0);
        let gray = Color::from_rgb8(120, 120, 120);
        let (dot_color, pump_text) = if self.pump.watering {
            (green, "Watering...".to_owned())
        } else {
            match self.pump.last_watered {
                Some(at) => (gray, format!("Last watered {}", at.format("%H:%M:%S"))),
                None => (gray, "Pump idle".to_owned()),
            }
        };
        let status = row![
            text("●").size(18.0).color(dot_color),
            text(pump_text).size(14.0),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        column![
            title,
            row![selector, status].spacing(20).align_y(Alignment::Center),
            row![short_chart, long_chart].spacing(10),
            row![
                text(temperature_text).size(16.0),
                text(humidity_text).size(16.0),
            ]
            .spacing(40),
        ]
        .spacing(10)
        .padding(10)
        .align_x(Alignment::Start)
        .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(DRAIN_INTERVAL).map(|_| Message::Tick)
    }
}

/// Last `n` samples plus the index of the first one kept.
fn tail(samples: &[f64], n: usize) -> (usize, &[f64]) {
    let start = samples.len().saturating_sub(n);
    (start, &samples[start..])
}

struct MoistureChart<'a> {
    title: &'static str,
    samples: &'a [f64],
    x_offset: usize,
}

impl<'a> Chart<Message> for MoistureChart<'a> {
    type State = ();

    fn build_chart<DB: DrawingBackend>(
        &self,
        _state: &Self::State,
        mut builder: plotters_iced::ChartBuilder<DB>,
    ) {
        let x_start = self.x_offset as f64;
        let x_end = (self.x_offset + self.samples.len().max(1)) as f64;

        let mut chart = builder
            .caption(self.title, ("sans-serif", 16))
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Left, 50)
            .set_label_area_size(LabelAreaPosition::Bottom, 35)
            .build_cartesian_2d(x_start..x_end, 0f64..100f64)
            .expect("failed to build chart");

        chart
            .configure_mesh()
            .x_desc("Time (s)")
            .y_desc("Moisture Level (%)")
            .axis_desc_style(("sans-serif", 13))
            .draw()
            .expect("failed to draw mesh");

        if self.samples.is_empty() {
            return;
        }

        let points = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, &v)| ((self.x_offset + i) as f64, v));

        chart
            .draw_series(LineSeries::new(points.clone(), &GREEN))
            .expect("failed to draw series");
        chart
            .draw_series(points.map(|(x, y)| Circle::new((x, y), 3, GREEN.filled())))
            .expect("failed to draw markers");
    }
}

/// Runs the window event loop on the calling thread until the window closes.
pub fn run(
    store: sync::Arc<store::Store>,
    events: mpsc::Receiver<store::Event>,
) -> Result<(), failure::Error> {
    // The boot closure must be cloneable, so the receiver is handed over
    // through a slot instead of being captured directly.
    let events = sync::Arc::new(sync::Mutex::new(Some(events)));
    let boot = move || {
        let events = events
            .lock()
            .unwrap()
            .take()
            .expect("window state initialized twice");
        (App::new(store.clone(), events), Task::none())
    };

    iced::application(App::title, App::update, App::view)
        .subscription(App::subscription)
        .window(iced::window::Settings {
            size: Size::new(WINDOW_WIDTH, WINDOW_HEIGHT),
            resizable: false,
            ..Default::default()
        })
        .antialiasing(true)
        .run_with(boot)
        .map_err(|e| failure::format_err!("window event loop failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_term_window_keeps_the_last_ten_in_order() {
        let samples: Vec<f64> = (1..=37).map(f64::from).collect();

        let (offset, window) = tail(&samples, SHORT_TERM_WINDOW);

        assert_eq!(offset, 27);
        let expected: Vec<f64> = (28..=37).map(f64::from).collect();
        assert_eq!(window, expected.as_slice());
    }

    #[test]
    fn short_histories_are_shown_whole() {
        let samples = vec![55.0, 56.0, 57.0];

        let (offset, window) = tail(&samples, SHORT_TERM_WINDOW);

        assert_eq!(offset, 0);
        assert_eq!(window, samples.as_slice());
    }

    #[test]
    fn empty_history_yields_an_empty_window() {
        let (offset, window) = tail(&[], SHORT_TERM_WINDOW);

        assert_eq!(offset, 0);
        assert!(window.is_empty());
    }
}
