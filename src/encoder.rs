//! Protocol encoder: LED colors to PWM FIFO bit patterns.
//!
//! Every protocol bit becomes a fixed 3-bit symbol on the wire — `0b110`
//! for logic 1, `0b100` for logic 0 — giving the roughly ⅔/⅓ duty split the
//! WS281x timing window asks for at the configured bit rate. Color bytes are
//! brightness-scaled, gamma-corrected, and emitted most-significant bit
//! first; symbol bits land most-significant first in the destination words,
//! starting at bit 31. With both PWM sub-channels active, destination words
//! interleave by channel (stride 2, each channel starting at its own index),
//! which is what lets a single DMA stream feed both halves of the FIFO.

use std::time::Duration;

use crate::channel::Channel;
use crate::memmap::RegisterWindow;

/// PWM clock periods per protocol bit (the ternary symbol width).
pub const BITS_PER_OUTPUT_BIT: u32 = 3;

/// Symbol emitted for a logic-1 protocol bit.
pub const SYMBOL_HIGH: u8 = 0b110;

/// Symbol emitted for a logic-0 protocol bit.
pub const SYMBOL_LOW: u8 = 0b100;

/// Wire period of one protocol bit, in nanoseconds.
fn bit_period_ns(frequency_hz: u32) -> u64 {
    // 1.25 us per bit at 800 kHz, 2.5 us at 400 kHz.
    if frequency_hz == 800_000 { 1250 } else { 2500 }
}

/// 256-entry color correction table applied after brightness scaling.
#[derive(Clone)]
pub struct GammaTable([u8; 256]);

impl GammaTable {
    /// Identity table: output equals input.
    #[must_use]
    pub fn linear() -> Self {
        let mut table = [0u8; 256];
        for (index, entry) in table.iter_mut().enumerate() {
            *entry = index as u8;
        }
        Self(table)
    }

    /// Perceptual correction with the usual WS281x exponent of 2.8.
    #[must_use]
    pub fn perceptual() -> Self {
        Self::with_exponent(2.8)
    }

    /// Correction table for an arbitrary exponent.
    #[must_use]
    pub fn with_exponent(exponent: f32) -> Self {
        let mut table = [0u8; 256];
        for (index, entry) in table.iter_mut().enumerate() {
            let normalized = index as f32 / 255.0;
            *entry = (normalized.powf(exponent) * 255.0 + 0.5) as u8;
        }
        Self(table)
    }

    /// Look up the corrected value for `value`.
    #[must_use]
    pub fn correct(&self, value: u8) -> u8 {
        self.0[usize::from(value)]
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::linear()
    }
}

impl From<[u8; 256]> for GammaTable {
    fn from(table: [u8; 256]) -> Self {
        Self(table)
    }
}

/// Encode `channels` into `buffer` and return the worst-case wire time of
/// the resulting frame.
///
/// Each entry pairs a PWM sub-channel index with its channel configuration;
/// the caller passes only the channels selected for this render. With
/// `interleaved` set (two configured channels) a channel's words advance by
/// two, starting at its own index; otherwise words are sequential from zero.
pub(crate) fn encode<W: RegisterWindow>(
    buffer: &mut W,
    channels: &[(usize, &Channel)],
    gamma: &GammaTable,
    frequency_hz: u32,
    interleaved: bool,
) -> Duration {
    let period_ns = bit_period_ns(frequency_hz);
    let stride: u32 = if interleaved { 2 } else { 1 };
    let mut protocol_ns: u64 = 0;

    for &(slot, channel) in channels {
        protocol_ns = protocol_ns.max(channel.wire_bits() * period_ns);

        let shifts = channel.strip_type.shifts();
        let color_count = channel.strip_type.color_count();
        // Fixed output slot order: white (four-color strips only), then
        // red, green, blue. The shift descriptor maps slots onto the bytes
        // of the packed pixel word for this channel's wiring.
        let slot_shifts: [u32; 4] = if color_count == 4 {
            [shifts.white, shifts.red, shifts.green, shifts.blue]
        } else {
            [shifts.red, shifts.green, shifts.blue, 0]
        };
        let scale = u32::from(channel.brightness) + 1;

        let mut word_pos = slot as u32;
        let mut bit_pos: i32 = 31;
        let mut word: u32 = 0;
        for led in 0..channel.strip.len() {
            let pixel = channel.strip.get(led);
            for &shift in &slot_shifts[..color_count] {
                let scaled = (((pixel >> shift) & 0xff) * scale) >> 8;
                let color = gamma.correct(scaled as u8);
                for bit in (0..8).rev() {
                    let symbol = if color & (1 << bit) != 0 {
                        SYMBOL_HIGH
                    } else {
                        SYMBOL_LOW
                    };
                    for symbol_bit in (0..3).rev() {
                        if symbol & (1 << symbol_bit) != 0 {
                            word |= 1u32 << bit_pos;
                        }
                        bit_pos -= 1;
                        if bit_pos < 0 {
                            buffer.write(word_pos * 4, word);
                            word = 0;
                            bit_pos = 31;
                            word_pos += stride;
                        }
                    }
                }
            }
        }
        // Flush the trailing partial word; its remaining bits idle low.
        if bit_pos != 31 {
            buffer.write(word_pos * 4, word);
        }
    }

    Duration::from_micros(protocol_ns / 1000)
}
