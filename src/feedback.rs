// Rickshaw Passenger Unit — Feedback Sink
//
// Everything the passenger sees or hears goes through `FeedbackSink`:
// enumerated cues (status pixel colour + buzzer tone), free-text two-line
// messages, the live authentication screen, and the privilege-window
// indicator LED. The session machine never touches a device directly.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use crate::auth::AuthView;
use crate::drivers::buzzer::Buzzer;
use crate::drivers::display::OledDisplay;
use crate::drivers::neopixel::StatusPixel;
use crate::events::FeedbackEvent;

// Status pixel colours (r, g, b). The yellow is what reads as yellow on
// the installed pixel; calibrated, not nominal.
const COLOR_RED: (u8, u8, u8) = (255, 0, 0);
const COLOR_GREEN: (u8, u8, u8) = (0, 255, 0);
const COLOR_YELLOW: (u8, u8, u8) = (80, 255, 0);

pub trait FeedbackSink {
    /// Render one enumerated cue (colour + tone + log line).
    fn event(&mut self, event: FeedbackEvent);
    /// Two-line status message (connection progress, errors, results).
    fn message(&mut self, line1: &str, line2: &str);
    /// Live authentication screen: current distance plus phase progress.
    fn auth_screen(&mut self, view: AuthView, distance_m: f32);
    /// Privilege-window indicator LED.
    fn set_indicator(&mut self, on: bool);
}

/// The real sink: status pixel + buzzer + OLED + indicator LED. Actuator
/// errors are logged and swallowed — feedback must never take the control
/// loop down.
pub struct UnitFeedback<'d> {
    display: OledDisplay,
    pixel: StatusPixel<'d>,
    buzzer: Buzzer<'d>,
    indicator: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> UnitFeedback<'d> {
    pub fn new(
        display: OledDisplay,
        pixel: StatusPixel<'d>,
        buzzer: Buzzer<'d>,
        indicator: PinDriver<'d, AnyOutputPin, Output>,
    ) -> Self {
        Self {
            display,
            pixel,
            buzzer,
            indicator,
        }
    }

    fn set_pixel(&mut self, (r, g, b): (u8, u8, u8)) {
        if let Err(e) = self.pixel.set_rgb(r, g, b) {
            log::warn!("Status pixel update failed: {}", e);
        }
    }

    fn pixel_off(&mut self) {
        if let Err(e) = self.pixel.off() {
            log::warn!("Status pixel update failed: {}", e);
        }
    }
}

impl FeedbackSink for UnitFeedback<'_> {
    fn event(&mut self, event: FeedbackEvent) {
        log::info!("Feedback cue: {:?}", event);
        match event {
            FeedbackEvent::Requesting => {
                self.set_pixel(COLOR_YELLOW);
                self.buzzer.play_request();
            }
            FeedbackEvent::Accepted => {
                self.set_pixel(COLOR_GREEN);
                self.buzzer.play_accept();
            }
            FeedbackEvent::InProgress => {
                self.set_pixel(COLOR_GREEN);
                self.buzzer.silence();
            }
            FeedbackEvent::Rejected => {
                self.set_pixel(COLOR_RED);
                self.buzzer.play_reject();
            }
            FeedbackEvent::Idle => {
                self.pixel_off();
                self.buzzer.silence();
            }
            FeedbackEvent::AuthAccepted => {
                self.buzzer.play_accept();
            }
            FeedbackEvent::AuthRejected => {
                self.buzzer.play_reject();
            }
        }
    }

    fn message(&mut self, line1: &str, line2: &str) {
        log::info!("OLED: {} / {}", line1, line2);
        if let Err(e) = self.display.show_message(line1, line2) {
            log::warn!("Display write failed: {}", e);
        }
    }

    fn auth_screen(&mut self, view: AuthView, distance_m: f32) {
        if let Err(e) = self.display.show_auth(view, distance_m) {
            log::warn!("Display write failed: {}", e);
        }
    }

    fn set_indicator(&mut self, on: bool) {
        let result = if on {
            self.indicator.set_high()
        } else {
            self.indicator.set_low()
        };
        if let Err(e) = result {
            log::warn!("Indicator LED update failed: {}", e);
        }
    }
}

/// Test double that records everything it is asked to render.
#[cfg(test)]
pub struct RecordingFeedback {
    pub events: Vec<FeedbackEvent>,
    pub messages: Vec<(String, String)>,
    pub indicator: bool,
}

#[cfg(test)]
impl RecordingFeedback {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            messages: Vec::new(),
            indicator: false,
        }
    }
}

#[cfg(test)]
impl FeedbackSink for RecordingFeedback {
    fn event(&mut self, event: FeedbackEvent) {
        self.events.push(event);
    }

    fn message(&mut self, line1: &str, line2: &str) {
        self.messages.push((line1.to_owned(), line2.to_owned()));
    }

    fn auth_screen(&mut self, _view: AuthView, _distance_m: f32) {}

    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
    }
}
