pub mod buzzer;
pub mod display;
pub mod ldr;
pub mod neopixel;
pub mod ultrasonic;
