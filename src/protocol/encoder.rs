//! NU801 frame encoder
//!
//! The NU801 has no real protocol: the three 16-bit PWM values are shifted
//! in one after the other, MSB first, one bit per clock pulse. There is no
//! addressing, acknowledgement or checksum.
//!
//! A frame only takes effect once it is latched. Boards that wire the latch
//! enable input (LEI) get a short high/low pulse on it. Boards without it
//! rely on the datasheet rule that a clock held high for more than 600us
//! generates an internal pseudo latch signal, so the last clock pulse of the
//! frame is stretched instead.

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::devices::HardwareProfile;
use crate::error::Result;
use crate::gpio::{Bus, Line, LineBackend};

/// Clock-high time that makes the NU801 latch on its own
pub const LATCH_HOLD_US: u32 = 600;

/// Bits per channel
pub const PWM_BITS: u32 = 16;

/// Convert a host brightness into the chip's 16-bit PWM word
///
/// Bug-for-bug compatible with the kernel's leds-nu801 driver: the
/// brightness lands in the top byte and anything outside 0..=255 wraps,
/// because only the low 8 bits survive the shift. Do not clamp here.
pub fn pwm_word(brightness: i32) -> u16 {
    (brightness << 8) as u16
}

/// Shifts frames onto the bus according to a board's wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    has_latch: bool,
    bit_delay_ns: u32,
}

impl FrameEncoder {
    pub fn new(has_latch: bool, bit_delay_ns: u32) -> Self {
        Self {
            has_latch,
            bit_delay_ns,
        }
    }

    pub fn for_profile(profile: &HardwareProfile) -> Self {
        Self::new(profile.has_latch(), profile.ndelay)
    }

    /// Shift one PWM word per channel and latch the frame
    ///
    /// Any failed commit aborts the frame; the next call starts over with a
    /// complete frame.
    pub fn write_frame<B, D>(&self, bus: &mut Bus<B>, delay: &mut D, brightness: &[i32]) -> Result<()>
    where
        B: LineBackend,
        D: DelayNs,
    {
        debug!("Committing {:?} to NU801", brightness);

        let last = brightness.len().saturating_sub(1);
        for (channel, &value) in brightness.iter().enumerate() {
            let word = pwm_word(value);

            for bit in (0..PWM_BITS).rev() {
                bus.set_line(Line::Data, word & (1 << bit) != 0);
                bus.set_line(Line::Clock, true);
                bus.commit()?;

                if channel == last && bit == 0 && !self.has_latch {
                    delay.delay_us(LATCH_HOLD_US);
                } else {
                    delay.delay_ns(self.bit_delay_ns);
                }

                bus.set_line(Line::Clock, false);
                bus.commit()?;
                delay.delay_ns(self.bit_delay_ns);
            }
        }

        if self.has_latch {
            bus.set_line(Line::Latch, true);
            bus.commit()?;
            delay.delay_ns(self.bit_delay_ns);

            bus.set_line(Line::Latch, false);
            bus.commit()?;
            delay.delay_ns(self.bit_delay_ns);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{MX100_PROFILE, Z1_PROFILE};
    use crate::error::Error;
    use crate::gpio::testing::{Event, Recorder};

    const HOLD_NS: u64 = LATCH_HOLD_US as u64 * 1_000;

    fn encode(profile: &HardwareProfile, brightness: &[i32]) -> Recorder {
        let recorder = Recorder::new();
        let mut bus = Bus::new(recorder.lines(), profile.num_lines());
        let mut delay = recorder.delay();

        FrameEncoder::for_profile(profile)
            .write_frame(&mut bus, &mut delay, brightness)
            .unwrap();

        recorder
    }

    #[test]
    fn test_pwm_word_for_host_range() {
        for b in 0..=255 {
            assert_eq!(pwm_word(b), ((b << 8) & 0xFFFF) as u16);
        }
        assert_eq!(pwm_word(1), 0x0100);
        assert_eq!(pwm_word(127), 0x7F00);
    }

    #[test]
    fn test_pwm_word_wraps_out_of_range() {
        assert_eq!(pwm_word(256), 0x0000);
        assert_eq!(pwm_word(257), 0x0100);
        assert_eq!(pwm_word(-1), 0xFF00);
        assert_eq!(pwm_word(-128), 0x8000);
    }

    #[test]
    fn test_mx100_all_off_frame() {
        let recorder = encode(&MX100_PROFILE, &[0, 0, 0]);

        assert_eq!(recorder.shifted_words(), vec![0, 0, 0]);
        assert_eq!(recorder.commits().len(), 48 * 2);
        assert!(recorder.commits().iter().all(|v| v.bits & Line::Data.bit() == 0));
        assert!(recorder.commits().iter().all(|v| v.mask == 0b011));
    }

    #[test]
    fn test_no_latch_ends_with_clock_hold() {
        let recorder = encode(&MX100_PROFILE, &[12, 200, 255]);
        let holds = recorder.clock_high_holds();

        assert_eq!(holds.len(), 48);
        assert!(*holds.last().unwrap() >= HOLD_NS);
        assert!(holds[..47].iter().all(|&h| h < HOLD_NS));

        let last = *recorder.commits().last().unwrap();
        assert_eq!(last.bits & Line::Clock.bit(), 0);
    }

    #[test]
    fn test_z1_frame_with_latch_pulse() {
        let recorder = encode(&Z1_PROFILE, &[255, 128, 0]);

        assert_eq!(recorder.shifted_words(), vec![0xFF00, 0x8000, 0x0000]);
        assert_eq!(recorder.latch_levels(), vec![false, true, false]);
        assert!(recorder.clock_high_holds().iter().all(|&h| h < HOLD_NS));

        let commits = recorder.commits();
        let n = commits.len();
        assert_eq!(n, 48 * 2 + 2);
        assert_ne!(commits[n - 2].bits & Line::Latch.bit(), 0);
        assert_eq!(commits[n - 1].bits & Line::Latch.bit(), 0);
        assert!(commits.iter().all(|v| v.mask == 0b111));
    }

    #[test]
    fn test_two_channel_frame() {
        let recorder = encode(&MX100_PROFILE, &[1, 2]);

        assert_eq!(recorder.shifted_words(), vec![0x0100, 0x0200]);
        assert!(*recorder.clock_high_holds().last().unwrap() >= HOLD_NS);
    }

    #[test]
    fn test_frames_are_repeatable() {
        let recorder = Recorder::new();
        let mut bus = Bus::new(recorder.lines(), 3);
        let mut delay = recorder.delay();
        let encoder = FrameEncoder::for_profile(&Z1_PROFILE);

        encoder.write_frame(&mut bus, &mut delay, &[10, 20, 30]).unwrap();
        let first = recorder.events();
        recorder.clear();

        encoder.write_frame(&mut bus, &mut delay, &[10, 20, 30]).unwrap();
        assert_eq!(recorder.events(), first);
    }

    #[test]
    fn test_inter_bit_delay() {
        let recorder = encode(&Z1_PROFILE, &[0, 0, 0]);
        let delays: Vec<u64> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Delay(ns) => Some(ns),
                _ => None,
            })
            .collect();

        assert_eq!(delays.len(), 48 * 2 + 2);
        assert!(delays.iter().all(|&ns| ns == Z1_PROFILE.ndelay as u64));
    }

    #[test]
    fn test_commit_failure_aborts_frame() {
        let recorder = Recorder::new();
        let mut bus = Bus::new(recorder.lines(), 2);
        let mut delay = recorder.delay();
        recorder.fail_commits();

        let result = FrameEncoder::new(false, 0).write_frame(&mut bus, &mut delay, &[1, 2, 3]);

        assert!(matches!(result, Err(Error::Commit(_))));
        assert!(recorder.events().is_empty());
    }
}
