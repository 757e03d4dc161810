//! Userspace LED devices (`/dev/uleds`)
//!
//! Each handle opened on `/dev/uleds` becomes one LED class device once a
//! `struct uleds_user_dev` has been written to it. From then on the handle
//! is pollable and every read returns the brightness last set by userspace
//! as a native-endian `int`.

use byteorder::{ByteOrder, NativeEndian};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::Path;

use crate::devices::profile::LED_MAX_NAME_SIZE;
use crate::error::{Error, Result};

pub const ULEDS_PATH: &str = "/dev/uleds";

/// Brightness range advertised for every LED
pub const MAX_BRIGHTNESS: i32 = 255;

/// Size of `struct uleds_user_dev`
pub const DESCRIPTOR_SIZE: usize = LED_MAX_NAME_SIZE + 4;

/// Size of one brightness report
pub const BRIGHTNESS_SIZE: usize = 4;

/// `struct uleds_user_dev`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UledsDescriptor {
    pub name: String,
    pub max_brightness: i32,
}

impl UledsDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_brightness: MAX_BRIGHTNESS,
        }
    }

    /// Encode as the kernel expects it: NUL padded name, then the maximum
    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        let name = self.name.as_bytes();
        let len = name.len().min(LED_MAX_NAME_SIZE - 1);
        buf[..len].copy_from_slice(&name[..len]);
        NativeEndian::write_i32(&mut buf[LED_MAX_NAME_SIZE..], self.max_brightness);
        buf
    }
}

/// One registered uleds device
#[derive(Debug)]
pub struct UledDevice {
    file: File,
}

impl UledDevice {
    /// Register `name` through the default `/dev/uleds`
    pub fn register(name: &str) -> Result<Self> {
        Self::register_at(Path::new(ULEDS_PATH), name)
    }

    /// Register `name` through the uleds node at `path`
    pub fn register_at(path: &Path, name: &str) -> Result<Self> {
        let registration = |source: io::Error| Error::Registration {
            name: name.to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(registration)?;

        let descriptor = UledsDescriptor::new(name).encode();
        let written = file.write(&descriptor).map_err(registration)?;
        if written < DESCRIPTOR_SIZE {
            return Err(registration(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write ({} of {} bytes)", written, DESCRIPTOR_SIZE),
            )));
        }

        debug!("Registered LED {}", name);
        Ok(Self { file })
    }
}

impl Read for UledDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsFd for UledDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

/// Read exactly one brightness report from `source`
///
/// A single `read` is issued. End of file and errors are fatal for the
/// channel, as is a report shorter than an `int`.
pub fn read_brightness<R: Read>(source: &mut R, name: &str) -> Result<i32> {
    let mut buf = [0u8; BRIGHTNESS_SIZE];
    let read = source.read(&mut buf).map_err(|source| Error::Read {
        name: name.to_string(),
        source,
    })?;

    match read {
        0 => Err(Error::Closed(name.to_string())),
        BRIGHTNESS_SIZE => Ok(NativeEndian::read_i32(&buf)),
        n => Err(Error::Read {
            name: name.to_string(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short brightness report ({} bytes)", n),
            ),
        }),
    }
}
