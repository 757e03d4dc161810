//! Hardware profiles for NU801 boards
//!
//! This module provides the built-in board catalog and support for extra
//! board definitions loaded from a TOML file. A profile is selected once at
//! startup by its exact identifier.

pub mod cisco;
pub mod meraki;
pub mod profile;

pub use cisco::MX100_PROFILE;
pub use meraki::Z1_PROFILE;
pub use profile::{HardwareProfile, MAX_LEDS};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Error;

/// Registry of built-in hardware profiles
pub static HARDWARE_PROFILES: Lazy<HashMap<&'static str, &'static HardwareProfile>> =
    Lazy::new(|| {
        let mut m = HashMap::new();
        m.insert("cisco-mx100-hw", &*MX100_PROFILE);
        m.insert("meraki,z1", &*Z1_PROFILE);
        m
    });

/// Get a built-in profile by its exact identifier
pub fn get_profile(id: &str) -> Option<&'static HardwareProfile> {
    HARDWARE_PROFILES.get(id).copied()
}

/// Built-in profile identifiers, sorted
pub fn profile_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = HARDWARE_PROFILES.keys().copied().collect();
    names.sort();
    names
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    device: Vec<HardwareProfile>,
}

/// Parse catalog content
///
/// ```toml
/// [[device]]
/// id = "my-board"
/// board = "myb"
/// gpiochip = "gpiochip1"
/// lines = { cki = 3, sdi = 4, lei = 5 }
/// ndelay = 150
/// leds = [
///     { color = "red", function = "status" },
///     { color = "green", function = "status" },
/// ]
/// ```
pub fn parse_catalog(content: &str) -> Result<Vec<HardwareProfile>> {
    let file: CatalogFile = toml::from_str(content).context("Failed to parse device catalog")?;

    for profile in &file.device {
        profile.validate()?;
    }

    Ok(file.device)
}

/// Load extra profiles from a catalog file
pub fn load_catalog(path: &Path) -> Result<Vec<HardwareProfile>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read device catalog: {}", path.display()))?;

    parse_catalog(&content).with_context(|| format!("Invalid device catalog: {}", path.display()))
}

/// Select the profile for `id`
///
/// Entries from `extra` take precedence over built-ins with the same id.
/// Matching is exact: no case folding, no prefixes.
pub fn resolve(id: &str, extra: &[HardwareProfile]) -> Result<HardwareProfile, Error> {
    let profile = extra
        .iter()
        .find(|p| p.id == id)
        .or_else(|| get_profile(id))
        .cloned()
        .ok_or_else(|| Error::UnknownDevice(id.to_string()))?;

    profile.validate()?;
    Ok(profile)
}
