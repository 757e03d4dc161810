//! Cisco Meraki MX100 hardware profile
//!
//! The MX100 wires the NU801 in 2-wire mode: there is no latch line, so
//! frames are latched by holding the clock high at the end.

use super::profile::{HardwareProfile, LedSpec, LineOffsets};
use once_cell::sync::Lazy;

/// Cisco MX100-HW profile
pub static MX100_PROFILE: Lazy<HardwareProfile> = Lazy::new(|| HardwareProfile {
    id: "cisco-mx100-hw".to_string(),
    board: Some("mx100".to_string()),
    gpiochip: "gpiochip0".to_string(),
    lines: LineOffsets {
        cki: 41,
        sdi: 6,
        lei: None,
    },
    ndelay: 150,
    leds: ["blue", "green", "red"]
        .iter()
        .map(|color| LedSpec {
            color: color.to_string(),
            function: "tricolor".to_string(),
        })
        .collect(),
});
