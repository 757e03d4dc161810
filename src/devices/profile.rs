//! Hardware profile definitions
//!
//! A profile describes how an NU801 is wired on a particular board: which
//! GPIO controller and line offsets drive it and which LEDs it exposes.

use serde::Deserialize;

use crate::error::{Error, Result};

/// The NU801 has three PWM channels
pub const MAX_LEDS: usize = 3;

/// Maximum length of a uleds name, including the terminating NUL
pub const LED_MAX_NAME_SIZE: usize = 64;

/// Line offsets on the GPIO controller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineOffsets {
    /// Clock input (CKI)
    pub cki: u32,
    /// Serial data input (SDI)
    pub sdi: u32,
    /// Latch enable input (LEI), absent on 2-wire boards
    #[serde(default)]
    pub lei: Option<u32>,
}

impl LineOffsets {
    /// Offsets in request order: CKI, SDI and, if wired, LEI
    pub fn as_vec(&self) -> Vec<u32> {
        let mut lines = vec![self.cki, self.sdi];
        lines.extend(self.lei);
        lines
    }
}

/// One LED exposed through uleds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedSpec {
    pub color: String,
    pub function: String,
}

/// Complete hardware profile
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HardwareProfile {
    /// Identifier passed on the command line (e.g. "cisco-mx100-hw")
    pub id: String,
    /// Board name, used as the first part of the LED names
    #[serde(default)]
    pub board: Option<String>,
    /// GPIO controller (e.g. "gpiochip0")
    pub gpiochip: String,
    /// Line offsets on the controller
    pub lines: LineOffsets,
    /// Delay between bus edges in nanoseconds
    #[serde(default)]
    pub ndelay: u32,
    /// LEDs in channel order
    pub leds: Vec<LedSpec>,
}

impl HardwareProfile {
    /// Whether a dedicated latch line is wired
    pub fn has_latch(&self) -> bool {
        self.lines.lei.is_some()
    }

    /// Number of GPIO lines to request
    pub fn num_lines(&self) -> usize {
        if self.has_latch() {
            3
        } else {
            2
        }
    }

    /// uleds names in channel order
    pub fn led_names(&self) -> Vec<String> {
        self.leds
            .iter()
            .map(|led| led_name(self.board.as_deref(), &led.color, &led.function))
            .collect()
    }

    /// Check the wiring invariants of the profile
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidProfile {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if self.gpiochip.is_empty() {
            return Err(invalid("empty gpiochip"));
        }
        if self.leds.len() < 2 || self.leds.len() > MAX_LEDS {
            return Err(invalid("needs 2 or 3 LEDs"));
        }
        if self
            .leds
            .iter()
            .any(|led| led.color.is_empty() || led.function.is_empty())
        {
            return Err(invalid("LED color and function must not be empty"));
        }

        let lines = self.lines.as_vec();
        for (i, line) in lines.iter().enumerate() {
            if lines[i + 1..].contains(line) {
                return Err(invalid("line offsets must be distinct"));
            }
        }

        Ok(())
    }
}

/// Build the uleds name for one LED
///
/// Mirrors the reference driver, which formats into a buffer one byte short
/// of `LED_MAX_NAME_SIZE`, so at most 62 bytes survive.
pub fn led_name(board: Option<&str>, color: &str, function: &str) -> String {
    let mut name = match board {
        Some(board) if !board.is_empty() => format!("{}:{}:{}", board, color, function),
        _ => format!("{}:{}", color, function),
    };

    let max = LED_MAX_NAME_SIZE - 2;
    if name.len() > max {
        let mut end = max;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(lei: Option<u32>, leds: usize) -> HardwareProfile {
        HardwareProfile {
            id: "test".to_string(),
            board: Some("tb".to_string()),
            gpiochip: "gpiochip0".to_string(),
            lines: LineOffsets { cki: 1, sdi: 2, lei },
            ndelay: 0,
            leds: ["red", "green", "blue"]
                .iter()
                .take(leds)
                .map(|c| LedSpec {
                    color: c.to_string(),
                    function: "status".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_led_name_with_board() {
        assert_eq!(led_name(Some("mx100"), "blue", "tricolor"), "mx100:blue:tricolor");
    }

    #[test]
    fn test_led_name_without_board() {
        assert_eq!(led_name(None, "blue", "tricolor"), "blue:tricolor");
        assert_eq!(led_name(Some(""), "blue", "tricolor"), "blue:tricolor");
    }

    #[test]
    fn test_led_name_truncated() {
        let long = "x".repeat(80);
        assert_eq!(led_name(None, &long, "f").len(), 62);
    }

    #[test]
    fn test_line_count_follows_latch() {
        assert_eq!(profile(None, 3).num_lines(), 2);
        assert_eq!(profile(Some(3), 3).num_lines(), 3);
        assert_eq!(profile(Some(3), 3).lines.as_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_validate_led_count() {
        assert!(profile(None, 1).validate().is_err());
        assert!(profile(None, 2).validate().is_ok());
        assert!(profile(None, 3).validate().is_ok());
    }

    #[test]
    fn test_validate_distinct_lines() {
        assert!(profile(Some(2), 3).validate().is_err());
    }
}
