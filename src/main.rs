// Rickshaw Passenger Unit — Firmware Entry Point
//
// Boot sequence:
//   1. Bring up logging, peripherals, and the shared I2C bus.
//   2. Initialise the OLED, show the boot splash, self-check the panel.
//   3. Construct sensors, actuators, and the (not yet connected) ride link.
//   4. Enter the single cooperative loop around the session machine.
//
// Nothing runs in parallel: every component executes to completion inside
// one tick. The only blocking calls are the bounded WiFi/store connects
// inside an authorized button press, during which the unit is deliberately
// unresponsive.

mod auth;
mod config;
mod drivers;
mod events;
mod feedback;
mod input;
mod link;
mod net;
mod range;
mod session;
mod store;

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, OutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::prelude::*;
use esp_idf_hal::rmt::{config::TransmitConfig, TxRmtDriver};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use crate::config::*;
use crate::drivers::buzzer::Buzzer;
use crate::drivers::display::OledDisplay;
use crate::drivers::ldr::LightSensor;
use crate::drivers::neopixel::StatusPixel;
use crate::drivers::ultrasonic::RangeSensor;
use crate::feedback::UnitFeedback;
use crate::link::HttpRideLink;
use crate::net::WifiLink;
use crate::session::{Session, SessionPhase, TickInputs};

// ---------------------------------------------------------------------------
// Utility: milliseconds since boot (wraps at ~49 days — fine for timeouts)
// ---------------------------------------------------------------------------
pub fn now_ms() -> u32 {
    unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u32 }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------
fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("Rickshaw passenger unit starting…");

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    // ---- I2C bus (OLED) ---------------------------------------------------
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21, // SDA
        peripherals.pins.gpio22, // SCL
        &i2c_config,
    )?;
    // The bus outlives everything; firmware never exits.
    let i2c_bus: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));

    // ---- Boot splash + self-check -----------------------------------------
    let mut display = OledDisplay::new(i2c_bus);
    display.init()?;
    display.show_message("Booting...", "")?;
    if !display.is_connected() {
        log::error!("OLED not responding — continuing for serial debug");
    }
    thread::sleep(Duration::from_millis(BOOT_SPLASH_MS));

    // ---- Input: ride button (pull-up, active LOW) -------------------------
    let button = PinDriver::input(peripherals.pins.gpio4.downgrade_input())?;
    configure_pullup(&button);

    // ---- Auth sensors -----------------------------------------------------
    let mut range_sensor = RangeSensor::new(
        PinDriver::output(peripherals.pins.gpio13.downgrade_output())?,
        PinDriver::input(peripherals.pins.gpio12.downgrade_input())?,
    );
    let ldr = LightSensor::new()?;
    let indicator = PinDriver::output(peripherals.pins.gpio2.downgrade_output())?;

    // ---- Actuators --------------------------------------------------------
    let ledc_timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new()
            .frequency(2.kHz().into())
            .resolution(Resolution::Bits10),
    )?;
    let buzzer = Buzzer::new(LedcDriver::new(
        peripherals.ledc.channel0,
        ledc_timer,
        peripherals.pins.gpio26,
    )?);

    let pixel_tx = TxRmtDriver::new(
        peripherals.rmt.channel0,
        peripherals.pins.gpio19,
        &TransmitConfig::new().clock_divider(1),
    )?;
    let mut pixel = StatusPixel::new(pixel_tx);
    pixel.off()?;

    // ---- Ride link (constructed now, connected on an authorized press) ----
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = WifiLink::new(peripherals.modem, sys_loop, nvs)?;
    let ride_link = HttpRideLink::new(wifi);

    log::info!("Monitoring document path: {}", ride_document_path());

    // ---- Session ----------------------------------------------------------
    let unit_feedback = UnitFeedback::new(display, pixel, buzzer, indicator);
    let mut session = Session::new(ride_link, unit_feedback, now_ms());
    log::info!("Setup complete — waiting for authentication");

    // ---- Cooperative loop -------------------------------------------------
    let mut last_debug_ms: u32 = 0;
    loop {
        let now = now_ms();
        let authenticating = session.phase() == SessionPhase::AwaitingAuthentication;

        // The ranging pulse and LDR read only matter (and only run) while
        // authenticating; other phases tick with inert sensor inputs.
        let range_m = if authenticating { range_sensor.measure() } else { None };
        let ldr_raw = if authenticating { ldr.read_raw() } else { 0 };

        if authenticating && now.wrapping_sub(last_debug_ms) >= AUTH_DEBUG_LOG_MS {
            last_debug_ms = now;
            log::debug!("range: {:?} m, ldr: {}", range_m, ldr_raw);
        }

        session.tick(
            TickInputs {
                button_raw_pressed: button_pressed(&button),
                range_m,
                ldr_raw,
            },
            now,
        );

        thread::sleep(Duration::from_millis(LOOP_TICK_MS));
    }
}

// ---------------------------------------------------------------------------
// GPIO helpers
// ---------------------------------------------------------------------------

/// Active LOW with pull-up.
fn button_pressed(button: &PinDriver<'_, AnyInputPin, Input>) -> bool {
    button.is_low()
}

/// Enable the internal pull-up on the ride button. The driver already set
/// the direction; the pull mode goes through the raw API because the pin
/// was downgraded.
fn configure_pullup(_pin: &PinDriver<'_, AnyInputPin, Input>) {
    unsafe {
        esp_idf_sys::gpio_set_pull_mode(
            PIN_RIDE_BUTTON,
            esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY,
        );
    }
}
