// Rickshaw Passenger Unit — SSD1306 OLED Driver
//
// Register-level driver over the shared I2C bus (no external display crate,
// avoids version conflicts with esp-idf-hal). Holds a 1 KiB framebuffer and
// implements `embedded_graphics::DrawTarget`, so screens are composed with
// embedded-graphics text/primitives and pushed with `flush`.

use std::sync::Mutex;

use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};
use esp_idf_hal::i2c::I2cDriver;

use crate::auth::AuthView;
use crate::config::{
    DISPLAY_BUFFER_SIZE, I2C_ADDR_OLED, I2C_TIMEOUT_TICKS, PRESENCE_HOLD_MS, PRIVILEGE_WAIT_MS,
    SCREEN_HEIGHT, SCREEN_WIDTH,
};

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

const CTRL_COMMAND: u8 = 0x00;
const CTRL_DATA: u8 = 0x40;

pub struct OledDisplay {
    bus: SharedBus,
    buffer: [u8; DISPLAY_BUFFER_SIZE],
}

impl OledDisplay {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            bus,
            buffer: [0u8; DISPLAY_BUFFER_SIZE],
        }
    }

    fn command(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap();
        let mut frame = Vec::with_capacity(bytes.len() + 1);
        frame.push(CTRL_COMMAND);
        frame.extend_from_slice(bytes);
        bus.write(I2C_ADDR_OLED, &frame, I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    /// Standard 128x64 charge-pump init sequence.
    pub fn init(&mut self) -> anyhow::Result<()> {
        self.command(&[
            0xAE, // display off
            0xD5, 0x80, // clock divide
            0xA8, 0x3F, // multiplex 64
            0xD3, 0x00, // display offset
            0x40, // start line 0
            0x8D, 0x14, // charge pump on
            0x20, 0x00, // horizontal addressing
            0xA1, // segment remap
            0xC8, // COM scan direction
            0xDA, 0x12, // COM pins
            0x81, 0xCF, // contrast
            0xD9, 0xF1, // precharge
            0xDB, 0x40, // VCOM detect
            0xA4, // resume from RAM
            0xA6, // normal (non-inverted)
            0xAF, // display on
        ])?;
        self.clear();
        self.flush()?;
        log::info!("SSD1306 initialised");
        Ok(())
    }

    /// Probe the controller with a NOP command.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        bus.write(I2C_ADDR_OLED, &[CTRL_COMMAND, 0xE3], I2C_TIMEOUT_TICKS)
            .is_ok()
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    /// Push the framebuffer to the panel.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.command(&[0x21, 0x00, 0x7F])?; // column 0..127
        self.command(&[0x22, 0x00, 0x07])?; // page 0..7

        let mut bus = self.bus.lock().unwrap();
        let mut frame = Vec::with_capacity(DISPLAY_BUFFER_SIZE + 1);
        frame.push(CTRL_DATA);
        frame.extend_from_slice(&self.buffer);
        bus.write(I2C_ADDR_OLED, &frame, I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    /// Two-line status message: big first line, small second line.
    pub fn show_message(&mut self, line1: &str, line2: &str) -> anyhow::Result<()> {
        self.clear();
        let big = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        let _ = Text::with_baseline(line1, Point::new(0, 16), big, Baseline::Top).draw(self);
        if !line2.is_empty() {
            let _ = Text::with_baseline(line2, Point::new(0, 44), small, Baseline::Top).draw(self);
        }
        self.flush()
    }

    /// Live authentication screen: distance header plus phase progress.
    pub fn show_auth(&mut self, view: AuthView, distance_m: f32) -> anyhow::Result<()> {
        self.clear();
        let big = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        let header = format!("Dist: {:.1} cm", distance_m * 100.0);
        let _ = Text::with_baseline(&header, Point::zero(), small, Baseline::Top).draw(self);
        let _ = Line::new(Point::new(0, 11), Point::new(SCREEN_WIDTH as i32 - 1, 11))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(self);

        match view {
            AuthView::Waiting => {
                let _ = Text::with_baseline("Waiting...", Point::new(0, 16), big, Baseline::Top)
                    .draw(self);
            }
            AuthView::Holding { elapsed_ms } => {
                let body = format!(
                    "{:.1} / {:.1}s",
                    elapsed_ms as f32 / 1000.0,
                    PRESENCE_HOLD_MS as f32 / 1000.0
                );
                let _ = Text::with_baseline(&body, Point::new(0, 16), big, Baseline::Top).draw(self);
            }
            AuthView::Checking { elapsed_ms } => {
                let _ = Text::with_baseline("Check LDR", Point::new(0, 16), big, Baseline::Top)
                    .draw(self);
                let progress = format!(
                    "({:.1} / {:.1}s)",
                    elapsed_ms as f32 / 1000.0,
                    PRIVILEGE_WAIT_MS as f32 / 1000.0
                );
                let _ = Text::with_baseline(&progress, Point::new(0, 44), small, Baseline::Top)
                    .draw(self);
            }
            AuthView::Result { granted: true } => {
                let _ = Text::with_baseline("GRANTED!", Point::new(0, 16), big, Baseline::Top)
                    .draw(self);
                let _ = Text::with_baseline(
                    "Press button to request ride.",
                    Point::new(0, 44),
                    small,
                    Baseline::Top,
                )
                .draw(self);
            }
            AuthView::Result { granted: false } => {
                let _ = Text::with_baseline("NOT GRANTED", Point::new(0, 16), big, Baseline::Top)
                    .draw(self);
            }
        }
        self.flush()
    }
}

impl OriginDimensions for OledDisplay {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for OledDisplay {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if (0..SCREEN_WIDTH as i32).contains(&point.x)
                && (0..SCREEN_HEIGHT as i32).contains(&point.y)
            {
                let index = (point.y as usize / 8) * SCREEN_WIDTH as usize + point.x as usize;
                let bit = 1u8 << (point.y as usize % 8);
                if color.is_on() {
                    self.buffer[index] |= bit;
                } else {
                    self.buffer[index] &= !bit;
                }
            }
        }
        Ok(())
    }
}
