//! One configured output line of the PWM peripheral.

use crate::strip::{Leds, StripType};

/// A registered strip on one of the two PWM sub-channels.
///
/// Owned by the configuration; the encoder only reads it.
pub(crate) struct Channel {
    pub strip_type: StripType,
    pub strip: Box<dyn Leds>,
    pub pin: u32,
    pub invert: bool,
    /// Applied as a `(brightness + 1) / 256` scale on every color byte.
    pub brightness: u8,
}

impl Channel {
    /// Number of protocol bits one frame of this channel occupies on the
    /// wire, before symbol expansion.
    pub fn wire_bits(&self) -> u64 {
        self.strip.len() as u64 * self.strip_type.color_count() as u64 * 8
    }
}
