//! Host-facing LED channels
//!
//! - `uleds` - userspace LED class devices registered through `/dev/uleds`
//! - `dispatcher` - poll loop that turns brightness reports into NU801 frames

pub mod dispatcher;
pub mod uleds;

pub use dispatcher::{Cancel, Channel, Dispatcher};
pub use uleds::UledDevice;
