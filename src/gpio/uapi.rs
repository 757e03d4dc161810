//! Linux GPIO character device uAPI (v2)
//!
//! Just enough of `<linux/gpio.h>` to request a batch of output lines and
//! read or write their values by bitmask.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;

pub const GPIO_MAX_NAME_SIZE: usize = 32;
pub const GPIO_V2_LINES_MAX: usize = 64;
pub const GPIO_V2_LINE_NUM_ATTRS_MAX: usize = 10;

pub const GPIO_V2_LINE_FLAG_OUTPUT: u64 = 1 << 3;

/// _IOWR(0xB4, 0x07, struct gpio_v2_line_request)
const GPIO_V2_GET_LINE_IOCTL: libc::c_ulong = 0xC250_B407;
/// _IOWR(0xB4, 0x0E, struct gpio_v2_line_values)
const GPIO_V2_LINE_GET_VALUES_IOCTL: libc::c_ulong = 0xC010_B40E;
/// _IOWR(0xB4, 0x0F, struct gpio_v2_line_values)
const GPIO_V2_LINE_SET_VALUES_IOCTL: libc::c_ulong = 0xC010_B40F;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LineAttribute {
    pub id: u32,
    pub padding: u32,
    /// union of flags, values and debounce_period_us
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LineConfigAttribute {
    pub attr: LineAttribute,
    pub mask: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LineConfig {
    pub flags: u64,
    pub num_attrs: u32,
    pub padding: [u32; 5],
    pub attrs: [LineConfigAttribute; GPIO_V2_LINE_NUM_ATTRS_MAX],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LineRequest {
    pub offsets: [u32; GPIO_V2_LINES_MAX],
    pub consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub config: LineConfig,
    pub num_lines: u32,
    pub event_buffer_size: u32,
    pub padding: [u32; 5],
    pub fd: i32,
}

/// `struct gpio_v2_line_values`: bit `i` refers to the i-th requested line
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineValues {
    pub bits: u64,
    pub mask: u64,
}

const _: () = assert!(std::mem::size_of::<LineConfig>() == 272);
const _: () = assert!(std::mem::size_of::<LineRequest>() == 592);
const _: () = assert!(std::mem::size_of::<LineValues>() == 16);

impl LineRequest {
    fn outputs(offsets: &[u32], consumer: &str) -> Self {
        // SAFETY: plain-old-data kernel struct, all-zero is its documented default
        let mut req: LineRequest = unsafe { std::mem::zeroed() };

        req.offsets[..offsets.len()].copy_from_slice(offsets);
        let label = consumer.as_bytes();
        let len = label.len().min(GPIO_MAX_NAME_SIZE - 1);
        req.consumer[..len].copy_from_slice(&label[..len]);
        req.config.flags = GPIO_V2_LINE_FLAG_OUTPUT;
        req.num_lines = offsets.len() as u32;
        req
    }
}

fn chip_path(chip: &str) -> PathBuf {
    if chip.starts_with('/') {
        PathBuf::from(chip)
    } else {
        PathBuf::from("/dev").join(chip)
    }
}

/// Request `offsets` as output lines from `chip`
///
/// Returns the line request fd; closing it releases the lines.
pub fn request_output_lines(chip: &str, offsets: &[u32], consumer: &str) -> io::Result<OwnedFd> {
    if offsets.is_empty() || offsets.len() > GPIO_V2_LINES_MAX {
        return Err(io::Error::from(io::ErrorKind::InvalidInput));
    }

    let chip = OpenOptions::new().read(true).write(true).open(chip_path(chip))?;
    let mut req = LineRequest::outputs(offsets, consumer);

    // SAFETY: req is a properly sized gpio_v2_line_request
    let ret = unsafe { libc::ioctl(chip.as_raw_fd(), GPIO_V2_GET_LINE_IOCTL as _, &mut req as *mut LineRequest) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: on success the kernel hands us a fresh fd we now own
    Ok(unsafe { OwnedFd::from_raw_fd(req.fd) })
}

/// Read the values of the lines selected by `values.mask`
pub fn get_values(fd: &OwnedFd, values: &mut LineValues) -> io::Result<()> {
    // SAFETY: values is a gpio_v2_line_values
    let ret = unsafe { libc::ioctl(fd.as_raw_fd(), GPIO_V2_LINE_GET_VALUES_IOCTL as _, values as *mut LineValues) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Drive the lines selected by `values.mask` to `values.bits`
pub fn set_values(fd: &OwnedFd, values: &LineValues) -> io::Result<()> {
    let mut values = *values;
    // SAFETY: values is a gpio_v2_line_values
    let ret = unsafe {
        libc::ioctl(fd.as_raw_fd(), GPIO_V2_LINE_SET_VALUES_IOCTL as _, &mut values as *mut LineValues)
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
