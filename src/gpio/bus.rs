//! Batched GPIO bus for the NU801 control lines
//!
//! The clock, data and optional latch lines are requested together and
//! driven as one register: line levels are staged in memory with
//! [`Bus::set_line`] and written to the kernel in a single call by
//! [`Bus::commit`].

use log::debug;
use std::io;
use std::os::fd::OwnedFd;

use super::uapi::{self, LineValues};
use crate::devices::HardwareProfile;
use crate::error::{Error, Result};

/// Consumer label shown by the kernel for the requested lines
pub const CONSUMER: &str = "nu801";

/// Control lines, numbered by their index in the line request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// CKI
    Clock = 0,
    /// SDI
    Data = 1,
    /// LEI
    Latch = 2,
}

impl Line {
    pub fn bit(self) -> u64 {
        1 << self as u32
    }
}

/// Something that can drive a batch of requested lines
pub trait LineBackend {
    /// Write `values.bits` to the lines selected by `values.mask`
    fn set_values(&mut self, values: &LineValues) -> io::Result<()>;

    /// Read the lines selected by `values.mask` into `values.bits`
    fn get_values(&mut self, values: &mut LineValues) -> io::Result<()>;
}

/// Lines requested from a GPIO character device
#[derive(Debug)]
pub struct ChipLines {
    fd: OwnedFd,
}

impl ChipLines {
    /// Request `offsets` from `chip` as outputs
    pub fn request(chip: &str, offsets: &[u32]) -> io::Result<Self> {
        let fd = uapi::request_output_lines(chip, offsets, CONSUMER)?;
        Ok(Self { fd })
    }
}

impl LineBackend for ChipLines {
    fn set_values(&mut self, values: &LineValues) -> io::Result<()> {
        uapi::set_values(&self.fd, values)
    }

    fn get_values(&mut self, values: &mut LineValues) -> io::Result<()> {
        uapi::get_values(&self.fd, values)
    }
}

/// Staged line levels plus the handle they are committed to
#[derive(Debug)]
pub struct Bus<B: LineBackend> {
    state: LineValues,
    backend: Option<B>,
}

impl<B: LineBackend> Bus<B> {
    /// Wrap `backend`, which holds `num_lines` requested lines
    pub fn new(backend: B, num_lines: usize) -> Self {
        let mask = (0..num_lines).fold(0u64, |mask, i| mask | (1 << i));
        Self {
            state: LineValues { bits: 0, mask },
            backend: Some(backend),
        }
    }

    /// Stage `line` at `level` without touching the hardware
    pub fn set_line(&mut self, line: Line, level: bool) {
        if level {
            self.state.bits |= line.bit();
        } else {
            self.state.bits &= !line.bit();
        }
    }

    /// Write all staged levels to the hardware in one call
    pub fn commit(&mut self) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(Error::Released)?;
        backend.set_values(&self.state).map_err(Error::Commit)
    }

    /// Read back the current line levels
    pub fn read_back(&mut self) -> Result<LineValues> {
        let backend = self.backend.as_mut().ok_or(Error::Released)?;
        let mut values = LineValues {
            bits: 0,
            mask: self.state.mask,
        };
        backend.get_values(&mut values).map_err(Error::Commit)?;
        Ok(values)
    }

    /// Return the lines to the system; a second call does nothing
    pub fn release(&mut self) {
        if self.backend.take().is_some() {
            debug!("Released GPIO lines");
        }
    }

}

#[cfg(test)]
impl<B: LineBackend> Bus<B> {
    /// Currently staged values
    pub fn state(&self) -> LineValues {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.backend.is_none()
    }
}

/// Request the control lines described by `profile`
pub fn acquire(profile: &HardwareProfile) -> Result<Bus<ChipLines>> {
    let offsets = profile.lines.as_vec();
    debug!(
        "Registering '{}' gpio-lines on {}: {:?}",
        offsets.len(),
        profile.gpiochip,
        offsets
    );

    let lines = ChipLines::request(&profile.gpiochip, &offsets).map_err(|source| {
        Error::Acquisition {
            chip: profile.gpiochip.clone(),
            source,
        }
    })?;

    let mut bus = Bus::new(lines, profile.num_lines());

    // Only for the log, the protocol never trusts these
    let initial = bus.read_back().map_err(|err| match err {
        Error::Commit(source) => Error::Acquisition {
            chip: profile.gpiochip.clone(),
            source,
        },
        other => other,
    })?;
    debug!(
        "Initial states: bits:{:#x} mask:{:#x}",
        initial.bits, initial.mask
    );

    Ok(bus)
}
