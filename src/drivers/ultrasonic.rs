// Rickshaw Passenger Unit — HC-SR04 Ranging Driver
//
// 10 µs trigger pulse, then busy-wait on the echo line with a hard timeout.
// One measurement takes at most ~2x the echo timeout (~60 ms), well inside
// a cooperative tick budget at the rate the auth phase samples.

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver};

use crate::config::ECHO_TIMEOUT_US;
use crate::range::echo_us_to_meters;

fn now_us() -> u64 {
    unsafe { esp_idf_sys::esp_timer_get_time() as u64 }
}

pub struct RangeSensor<'d> {
    trigger: PinDriver<'d, AnyOutputPin, Output>,
    echo: PinDriver<'d, AnyInputPin, Input>,
}

impl<'d> RangeSensor<'d> {
    pub fn new(
        trigger: PinDriver<'d, AnyOutputPin, Output>,
        echo: PinDriver<'d, AnyInputPin, Input>,
    ) -> Self {
        Self { trigger, echo }
    }

    /// One ranging pulse. `None` means the echo never arrived (nothing in
    /// range, absorbed pulse) — the caller's filter keeps the last valid
    /// distance in that case.
    pub fn measure(&mut self) -> Option<f32> {
        let _ = self.trigger.set_low();
        Ets::delay_us(2);
        let _ = self.trigger.set_high();
        Ets::delay_us(10);
        let _ = self.trigger.set_low();

        // Rising edge of the echo pulse.
        let wait_start = now_us();
        while self.echo.is_low() {
            if now_us() - wait_start > ECHO_TIMEOUT_US as u64 {
                return None;
            }
        }

        // Falling edge; the high time is the round trip.
        let rise = now_us();
        while self.echo.is_high() {
            if now_us() - rise > ECHO_TIMEOUT_US as u64 {
                return None;
            }
        }
        let duration_us = (now_us() - rise) as u32;

        let distance_m = echo_us_to_meters(duration_us);
        if distance_m > 0.0 {
            Some(distance_m)
        } else {
            None
        }
    }
}
