//! Recording line backend and delay for waveform tests
//!
//! Both halves append to one shared timeline so tests can check what was
//! committed and how long each level was held.

use embedded_hal::delay::DelayNs;
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

use super::bus::{LineBackend, Line};
use super::uapi::LineValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Commit(LineValues),
    Delay(u64),
    Released,
}

#[derive(Default)]
struct Shared {
    events: RefCell<Vec<Event>>,
    fail_commits: Cell<bool>,
}

#[derive(Clone, Default)]
pub struct Recorder {
    shared: Rc<Shared>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> RecordingLines {
        RecordingLines {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn delay(&self) -> RecordingDelay {
        RecordingDelay {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn fail_commits(&self) {
        self.shared.fail_commits.set(true);
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.shared.events.borrow_mut().clear();
    }

    pub fn commits(&self) -> Vec<LineValues> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Commit(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Data bits sampled on every rising clock edge, grouped into 16-bit words
    pub fn shifted_words(&self) -> Vec<u16> {
        let mut bits = Vec::new();
        let mut clock = false;
        for values in self.commits() {
            let high = values.bits & Line::Clock.bit() != 0;
            if high && !clock {
                bits.push(values.bits & Line::Data.bit() != 0);
            }
            clock = high;
        }
        bits.chunks(16)
            .map(|word| word.iter().fold(0u16, |acc, &b| (acc << 1) | b as u16))
            .collect()
    }

    /// Levels of the latch line across all commits, with repeats collapsed
    pub fn latch_levels(&self) -> Vec<bool> {
        let mut levels: Vec<bool> = Vec::new();
        for values in self.commits() {
            let level = values.bits & Line::Latch.bit() != 0;
            if levels.last() != Some(&level) {
                levels.push(level);
            }
        }
        levels
    }

    /// Total delay spent between each rising clock commit and the next commit
    pub fn clock_high_holds(&self) -> Vec<u64> {
        let mut holds = Vec::new();
        let mut current: Option<u64> = None;
        let mut clock = false;
        for event in self.events() {
            match event {
                Event::Commit(values) => {
                    if let Some(hold) = current.take() {
                        holds.push(hold);
                    }
                    let high = values.bits & Line::Clock.bit() != 0;
                    if high && !clock {
                        current = Some(0);
                    }
                    clock = high;
                }
                Event::Delay(ns) => {
                    if let Some(hold) = current.as_mut() {
                        *hold += ns;
                    }
                }
                Event::Released => {}
            }
        }
        holds
    }
}

pub struct RecordingLines {
    shared: Rc<Shared>,
}

impl LineBackend for RecordingLines {
    fn set_values(&mut self, values: &LineValues) -> io::Result<()> {
        if self.shared.fail_commits.get() {
            return Err(io::Error::from_raw_os_error(libc::ENODEV));
        }
        self.shared.events.borrow_mut().push(Event::Commit(*values));
        Ok(())
    }

    fn get_values(&mut self, values: &mut LineValues) -> io::Result<()> {
        values.bits = 0;
        Ok(())
    }
}

impl Drop for RecordingLines {
    fn drop(&mut self) {
        self.shared.events.borrow_mut().push(Event::Released);
    }
}

pub struct RecordingDelay {
    shared: Rc<Shared>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.shared.events.borrow_mut().push(Event::Delay(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        self.shared
            .events
            .borrow_mut()
            .push(Event::Delay(us as u64 * 1_000));
    }
}
