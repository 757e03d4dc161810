//! GPIO access for the NU801 control lines
//!
//! - `uapi` - Linux GPIO character device ABI (v2 line requests)
//! - `bus` - batched clock/data/latch register on top of a line request

pub mod bus;
#[cfg(test)]
pub mod testing;
pub mod uapi;

pub use bus::{acquire, Bus, Line, LineBackend};
