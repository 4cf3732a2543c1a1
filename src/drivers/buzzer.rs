// Rickshaw Passenger Unit — Buzzer Driver
//
// Passive buzzer on an LEDC channel. Tone frequencies are retuned through
// the raw ledc API because the hal fixes the timer frequency at
// construction. Tones block the loop for their duration (at most 500 ms),
// same trade-off as a haptic pulse.

use std::thread;
use std::time::Duration;

use esp_idf_hal::ledc::LedcDriver;

pub struct Buzzer<'d> {
    driver: LedcDriver<'d>,
}

impl<'d> Buzzer<'d> {
    pub fn new(driver: LedcDriver<'d>) -> Self {
        Self { driver }
    }

    /// Sound `freq_hz` for `duration_ms`, then go quiet.
    pub fn tone(&mut self, freq_hz: u32, duration_ms: u64) {
        unsafe {
            esp_idf_sys::ledc_set_freq(
                esp_idf_sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                esp_idf_sys::ledc_timer_t_LEDC_TIMER_0,
                freq_hz,
            );
        }
        let half = self.driver.get_max_duty() / 2;
        if let Err(e) = self.driver.set_duty(half) {
            log::warn!("Buzzer duty set failed: {}", e);
            return;
        }
        thread::sleep(Duration::from_millis(duration_ms));
        self.silence();
    }

    pub fn play_request(&mut self) {
        self.tone(20, 200);
    }

    pub fn play_accept(&mut self) {
        self.tone(10, 150);
    }

    pub fn play_reject(&mut self) {
        self.tone(50, 500);
    }

    pub fn silence(&mut self) {
        let _ = self.driver.set_duty(0);
    }
}
