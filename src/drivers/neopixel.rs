// Rickshaw Passenger Unit — WS2812 Status Pixel
//
// Single addressable LED bit-banged through the RMT peripheral. 24-bit GRB
// frame, WS2812 timing at the RMT counter clock.

use std::time::Duration;

use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, TxRmtDriver};

// Panel brightness cap; full drive is blinding at eye level.
const BRIGHTNESS: u16 = 50;

pub struct StatusPixel<'d> {
    tx: TxRmtDriver<'d>,
}

impl<'d> StatusPixel<'d> {
    pub fn new(tx: TxRmtDriver<'d>) -> Self {
        Self { tx }
    }

    pub fn set_rgb(&mut self, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
        let scale = |v: u8| (v as u16 * BRIGHTNESS / 255) as u32;
        let grb = (scale(g) << 16) | (scale(r) << 8) | scale(b);

        let ticks_hz = self.tx.counter_clock()?;
        let t0h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(350))?;
        let t0l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(800))?;
        let t1h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(700))?;
        let t1l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(600))?;

        let mut signal = FixedLengthSignal::<24>::new();
        for i in 0..24u32 {
            let bit = (grb >> (23 - i)) & 1 != 0;
            let (high, low) = if bit { (t1h, t1l) } else { (t0h, t0l) };
            signal.set(i as usize, &(high, low))?;
        }
        self.tx.start_blocking(&signal)?;
        Ok(())
    }

    pub fn off(&mut self) -> anyhow::Result<()> {
        self.set_rgb(0, 0, 0)
    }
}
