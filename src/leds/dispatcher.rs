//! LED update dispatcher
//!
//! Single-threaded loop that blocks in `poll(2)` until one or more LED
//! handles report a new brightness, reads each ready handle once and then
//! pushes a complete frame for all channels to the NU801. The NU801 cannot
//! update a single channel, so every wake-up resends everything.
//!
//! The dispatcher owns the bus and the LED handles and is responsible for
//! leaving the hardware dark: [`Dispatcher::teardown`] turns all channels
//! off, commits that frame and releases the GPIO lines and LED handles. It
//! runs at most once, and at the latest when the dispatcher is dropped.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd};

use super::uleds::read_brightness;
use crate::devices::MAX_LEDS;
use crate::error::{Error, Result};
use crate::gpio::{Bus, LineBackend};
use crate::protocol::FrameEncoder;

/// Source of cancellation requests watched next to the LED handles
pub trait Cancel: AsFd {
    /// Consume a pending request, returning the signal that caused it
    fn take_signal(&self) -> Option<i32>;

    /// Keep further requests from interrupting teardown
    fn hold(&self) -> io::Result<()>;
}

/// Dispatcher states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Blocked until an LED handle is readable
    Idle,
    /// Reading the handles that are ready
    Applying,
    /// Sending the frame to the chip
    Committing,
}

/// One LED channel
#[derive(Debug)]
pub struct Channel<S> {
    name: String,
    source: Option<S>,
    brightness: i32,
}

impl<S> Channel<S> {
    pub fn new(name: &str, source: S) -> Self {
        Self {
            name: name.to_string(),
            source: Some(source),
            brightness: 0,
        }
    }

}

#[cfg(test)]
impl<S> Channel<S> {
    pub fn brightness(&self) -> i32 {
        self.brightness
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }
}

struct Wakeup {
    ready: Vec<usize>,
    cancelled: Option<i32>,
}

pub struct Dispatcher<S, B: LineBackend, D: DelayNs> {
    channels: Vec<Channel<S>>,
    bus: Bus<B>,
    encoder: FrameEncoder,
    delay: D,
    state: State,
    torn_down: bool,
}

impl<S, B: LineBackend, D: DelayNs> Dispatcher<S, B, D> {
    pub fn new(channels: Vec<Channel<S>>, bus: Bus<B>, encoder: FrameEncoder, delay: D) -> Self {
        debug_assert!(channels.len() <= MAX_LEDS);
        Self {
            channels,
            bus,
            encoder,
            delay,
            state: State::Idle,
            torn_down: false,
        }
    }

    /// Send the current brightness of every channel to the chip
    pub fn commit(&mut self) -> Result<()> {
        let mut values = [0i32; MAX_LEDS];
        let count = self.channels.len().min(MAX_LEDS);
        for (value, channel) in values.iter_mut().zip(&self.channels) {
            *value = channel.brightness;
        }

        self.encoder
            .write_frame(&mut self.bus, &mut self.delay, &values[..count])
    }

    /// Turn everything off and let go of the hardware
    ///
    /// Returns `false` if teardown already ran.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;

        info!("Turning LEDs off (stopped while {:?})", self.state);
        for channel in &mut self.channels {
            channel.brightness = 0;
        }
        if let Err(err) = self.commit() {
            warn!("Failed to commit final frame: {}", err);
        }

        self.bus.release();
        for channel in &mut self.channels {
            channel.source = None;
        }
        true
    }
}

impl<S, B, D> Dispatcher<S, B, D>
where
    S: Read + AsFd,
    B: LineBackend,
    D: DelayNs,
{
    /// Run until cancelled or until an LED or bus operation fails
    ///
    /// Returns the signal number that cancelled the loop. Teardown is left
    /// to the caller so it can run with signals held off.
    pub fn serve<C: Cancel>(&mut self, cancel: &C) -> Result<i32> {
        if self.torn_down {
            return Err(Error::Released);
        }

        loop {
            self.state = State::Idle;
            debug!("Polling LEDs...");
            let wakeup = self.wait(cancel)?;

            if let Some(signal) = wakeup.cancelled {
                info!("Received signal {}, shutting down", signal);
                return Ok(signal);
            }
            if wakeup.ready.is_empty() {
                continue;
            }

            self.state = State::Applying;
            self.apply(&wakeup.ready)?;

            self.state = State::Committing;
            self.commit()?;
        }
    }

    /// Serve, then tear down with `cancel` held off
    ///
    /// Teardown runs exactly once whether the loop was cancelled or failed.
    pub fn run<C: Cancel>(&mut self, cancel: &C) -> Result<i32> {
        let outcome = self.serve(cancel);

        if let Err(err) = cancel.hold() {
            warn!("Failed to hold off signals during teardown: {}", err);
        }
        self.teardown();

        outcome
    }

    /// Block until an LED handle or the cancellation source is readable
    fn wait<C: Cancel>(&mut self, cancel: &C) -> Result<Wakeup> {
        let mut fds: Vec<libc::pollfd> = self
            .channels
            .iter()
            .map(|channel| libc::pollfd {
                fd: channel
                    .source
                    .as_ref()
                    .map_or(-1, |source| source.as_fd().as_raw_fd()),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        fds.push(libc::pollfd {
            fd: cancel.as_fd().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });

        loop {
            // SAFETY: fds is a valid, exclusively borrowed pollfd array
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if ret >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::Poll(err));
            }
        }

        let (leds, control) = fds.split_at(self.channels.len());
        let cancelled = if control[0].revents != 0 {
            cancel.take_signal()
        } else {
            None
        };
        let ready = leds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents != 0)
            .map(|(i, _)| i)
            .collect();

        Ok(Wakeup { ready, cancelled })
    }

    /// Read each ready handle exactly once
    fn apply(&mut self, ready: &[usize]) -> Result<()> {
        for &i in ready {
            let channel = &mut self.channels[i];
            let name = channel.name.as_str();
            let source = channel
                .source
                .as_mut()
                .ok_or_else(|| Error::Closed(name.to_string()))?;

            debug!("LED {} has new data (old brightness: {})", i, channel.brightness);
            let brightness = read_brightness(source, name)?;
            debug!("Set LED {} to brightness {}", i, brightness);
            channel.brightness = brightness;
        }
        Ok(())
    }
}

#[cfg(test)]
impl<S, B: LineBackend, D: DelayNs> Dispatcher<S, B, D> {
    pub fn channels(&self) -> &[Channel<S>] {
        &self.channels
    }

    pub fn state(&self) -> State {
        self.state
    }
}

impl<S, B: LineBackend, D: DelayNs> Drop for Dispatcher<S, B, D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
