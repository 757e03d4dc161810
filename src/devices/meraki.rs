//! Meraki Z1 hardware profile
//!
//! The Z1 connects the latch enable input to its own GPIO, so frames are
//! latched with a short pulse instead of the 600us clock hold.

use super::profile::{HardwareProfile, LedSpec, LineOffsets};
use once_cell::sync::Lazy;

/// Meraki Z1 profile
pub static Z1_PROFILE: Lazy<HardwareProfile> = Lazy::new(|| HardwareProfile {
    id: "meraki,z1".to_string(),
    board: Some("z1".to_string()),
    gpiochip: "gpiochip0".to_string(),
    lines: LineOffsets {
        cki: 14,
        sdi: 15,
        lei: Some(16),
    },
    ndelay: 150,
    leds: ["red", "green", "blue"]
        .iter()
        .map(|color| LedSpec {
            color: color.to_string(),
            function: "tricolor".to_string(),
        })
        .collect(),
});
