//! NU801 wire protocol
//!
//! - `encoder` - brightness to PWM mapping and bit-banged frame output
//! - `delay` - sleeping [`embedded_hal::delay::DelayNs`] for bus timing

pub mod delay;
pub mod encoder;

pub use delay::SleepDelay;
pub use encoder::FrameEncoder;
