//! LED color sources and strip wiring descriptors.
//!
//! The encoder reads colors through the [`Leds`] trait: an indexed get/set of
//! one packed `0xWWRRGGBB` word plus a length query. [`LedStrip`] is the
//! usual implementation; [`SingleLed`] satisfies the same contract for a lone
//! LED.

/// Predefined RGB color constants from the `smart_leds` crate.
#[doc(inline)]
pub use smart_leds::colors;

/// 8-bit-per-channel RGB color used by the convenience setters.
pub use smart_leds::RGB8;

/// An ordered sequence of LED colors, packed as `0xWWRRGGBB` words.
///
/// Positions run from 0 to `len() - 1` along the physical strip. Reads of an
/// out-of-range position return black; out-of-range writes are ignored.
pub trait Leds {
    /// Number of LEDs in this source.
    fn len(&self) -> usize;

    /// `true` if the source holds no LEDs.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The packed `0xWWRRGGBB` color at `position`.
    fn get(&self, position: usize) -> u32;

    /// Set the packed `0xWWRRGGBB` color at `position`.
    fn set(&mut self, position: usize, color: u32);
}

fn pack(red: u8, green: u8, blue: u8, white: u8) -> u32 {
    u32::from(white) << 24 | u32::from(red) << 16 | u32::from(green) << 8 | u32::from(blue)
}

/// One LED, stored as a packed `0xWWRRGGBB` word.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SingleLed(pub u32);

impl SingleLed {
    /// Create a LED from separate color components.
    #[must_use]
    pub fn from_rgbw(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self(pack(red, green, blue, white))
    }

    /// The red component.
    #[must_use]
    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The green component.
    #[must_use]
    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The blue component.
    #[must_use]
    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// The white component.
    #[must_use]
    pub fn white(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

impl From<RGB8> for SingleLed {
    fn from(color: RGB8) -> Self {
        Self::from_rgbw(color.r, color.g, color.b, 0)
    }
}

impl Leds for SingleLed {
    fn len(&self) -> usize {
        1
    }

    fn get(&self, position: usize) -> u32 {
        if position == 0 { self.0 } else { 0 }
    }

    fn set(&mut self, position: usize, color: u32) {
        if position == 0 {
            self.0 = color;
        }
    }
}

/// A physical run of LEDs.
#[derive(Clone, Debug, Default)]
pub struct LedStrip {
    leds: Vec<u32>,
}

impl LedStrip {
    /// Create a strip of `count` LEDs, all black.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            leds: vec![0; count],
        }
    }

    /// Set the color at `position` from an [`RGB8`] value.
    pub fn set_color(&mut self, position: usize, color: RGB8) {
        self.set(position, pack(color.r, color.g, color.b, 0));
    }

    /// Set the color at `position` from separate components.
    pub fn set_rgbw(&mut self, position: usize, red: u8, green: u8, blue: u8, white: u8) {
        self.set(position, pack(red, green, blue, white));
    }

    /// Set every LED to `color`.
    pub fn fill(&mut self, color: u32) {
        self.leds.fill(color);
    }

    /// Rotate colors toward higher positions, wrapping at the end.
    pub fn rotate_right(&mut self, shift: usize) {
        if self.leds.is_empty() {
            return;
        }
        let shift = shift % self.leds.len();
        self.leds.rotate_right(shift);
    }

    /// Rotate colors toward lower positions, wrapping at the start.
    pub fn rotate_left(&mut self, shift: usize) {
        if self.leds.is_empty() {
            return;
        }
        let shift = shift % self.leds.len();
        self.leds.rotate_left(shift);
    }
}

impl Leds for LedStrip {
    fn len(&self) -> usize {
        self.leds.len()
    }

    fn get(&self, position: usize) -> u32 {
        self.leds.get(position).copied().unwrap_or(0)
    }

    fn set(&mut self, position: usize, color: u32) {
        if let Some(slot) = self.leds.get_mut(position) {
            *slot = color;
        }
    }
}

/// Strip wiring descriptor: four shift amounts selecting which byte of the
/// packed `0xWWRRGGBB` word feeds each output slot of this channel.
///
/// Strips without a white component (zero high nibble) carry three color
/// bytes per pixel; the SK6812 RGBW family carries four.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum StripType {
    /// SK6812 wired R, G, B, W.
    Sk6812Rgbw = 0x1810_0800,
    /// SK6812 wired R, B, G, W.
    Sk6812Rbgw = 0x1810_0008,
    /// SK6812 wired G, R, B, W.
    Sk6812Grbw = 0x1808_1000,
    /// SK6812 wired G, B, R, W.
    Sk6812Gbrw = 0x1808_0010,
    /// SK6812 wired B, R, G, W.
    Sk6812Brgw = 0x1800_1008,
    /// SK6812 wired B, G, R, W.
    Sk6812Bgrw = 0x1800_0810,
    /// WS2811 wired R, G, B.
    Ws2811Rgb = 0x0010_0800,
    /// WS2811 wired R, B, G.
    Ws2811Rbg = 0x0010_0008,
    /// WS2811 wired G, R, B.
    Ws2811Grb = 0x0008_1000,
    /// WS2811 wired G, B, R.
    Ws2811Gbr = 0x0008_0010,
    /// WS2811 wired B, R, G.
    Ws2811Brg = 0x0000_1008,
    /// WS2811 wired B, G, R.
    Ws2811Bgr = 0x0000_0810,
}

const WHITE_SHIFT_MASK: u32 = 0xf000_0000;

impl StripType {
    /// WS2812 strips are WS2811 wiring with G, R, B byte order.
    pub const WS2812: Self = Self::Ws2811Grb;
    /// RGB-only SK6812 strips share the WS2812 ordering.
    pub const SK6812: Self = Self::Ws2811Grb;
    /// SK6812 RGBW strips, G, R, B, W byte order.
    pub const SK6812W: Self = Self::Sk6812Grbw;

    /// Number of color bytes per pixel (3, or 4 when a white shift is set).
    #[must_use]
    pub fn color_count(self) -> usize {
        if (self as u32) & WHITE_SHIFT_MASK != 0 {
            4
        } else {
            3
        }
    }

    pub(crate) fn shifts(self) -> ColorShifts {
        let raw = self as u32;
        ColorShifts {
            white: (raw >> 24) & 0xff,
            red: (raw >> 16) & 0xff,
            green: (raw >> 8) & 0xff,
            blue: raw & 0xff,
        }
    }
}

/// Decoded shift amounts of a [`StripType`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct ColorShifts {
    pub white: u32,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

#[cfg(test)]
mod tests {
    use super::{LedStrip, Leds, RGB8, SingleLed, StripType};

    #[test]
    fn color_count_follows_white_nibble() {
        assert_eq!(StripType::WS2812.color_count(), 3);
        assert_eq!(StripType::Ws2811Bgr.color_count(), 3);
        assert_eq!(StripType::SK6812W.color_count(), 4);
        assert_eq!(StripType::Sk6812Bgrw.color_count(), 4);
    }

    #[test]
    fn grb_shifts_decode() {
        let shifts = StripType::Ws2811Grb.shifts();
        assert_eq!(shifts.white, 0);
        assert_eq!(shifts.red, 8);
        assert_eq!(shifts.green, 16);
        assert_eq!(shifts.blue, 0);
    }

    #[test]
    fn single_led_components_round_trip() {
        let led = SingleLed::from_rgbw(0x11, 0x22, 0x33, 0x44);
        assert_eq!(led.0, 0x4411_2233);
        assert_eq!(led.red(), 0x11);
        assert_eq!(led.green(), 0x22);
        assert_eq!(led.blue(), 0x33);
        assert_eq!(led.white(), 0x44);
        assert_eq!(led.len(), 1);
        assert_eq!(led.get(0), 0x4411_2233);
        assert_eq!(led.get(5), 0);
    }

    #[test]
    fn strip_ignores_out_of_range_positions() {
        let mut strip = LedStrip::new(2);
        strip.set(7, 0xdead_beef);
        assert_eq!(strip.get(7), 0);
        strip.set_color(1, RGB8::new(1, 2, 3));
        assert_eq!(strip.get(1), 0x0001_0203);
    }

    #[test]
    fn rotation_wraps() {
        let mut strip = LedStrip::new(3);
        strip.set(0, 1);
        strip.set(1, 2);
        strip.set(2, 3);
        strip.rotate_right(1);
        assert_eq!([strip.get(0), strip.get(1), strip.get(2)], [3, 1, 2]);
        strip.rotate_left(4);
        assert_eq!([strip.get(0), strip.get(1), strip.get(2)], [1, 2, 3]);
    }
}
