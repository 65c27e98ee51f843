//! Drive WS281x-family LED strips from Raspberry Pi userspace.
//!
//! The strip's serial protocol is generated entirely in hardware: a divided
//! oscillator clock paces the PWM serializer, whose FIFO is fed by a DMA
//! channel reading a pre-encoded bit buffer from uncached memory. This crate
//! owns that pipeline — clock divisor setup, DMA control-block construction
//! and transfer triggering, the encoder that packs colors into PWM bit
//! patterns, and the render throttle that keeps frames from overlapping.
//!
//! Physical memory mapping and GPIO pin muxing are *consumed* capabilities:
//! the application supplies implementations of [`memmap::MemoryMapper`] and
//! [`pin::GpioController`] (on a real Pi, backed by `/dev/mem` and the
//! mailbox allocator). Tests inject simulated ones.
//!
//! # Glossary
//!
//! - **Control block:** an 8-word DMA descriptor naming source, destination,
//!   length, and chaining for one transfer.
//! - **DREQ:** a peripheral's request line asking DMA for the next data unit;
//!   paces the transfer to the PWM FIFO drain rate.
//! - **Symbol:** the 3-bit PWM pattern carrying one logical protocol bit
//!   (`0b110` for 1, `0b100` for 0).
//! - **Bus address:** the address DMA hardware uses for memory, distinct from
//!   the process's virtual address for the same bytes.
//!
//! # Example
//!
//! ```no_run
//! use ws281x_pwm::{
//!     DriverKind, PeripheralRegistry, RenderTarget, Result, StripDriver,
//!     strip::{LedStrip, Leds, StripType},
//! };
//! # use ws281x_pwm::memmap::{Hardware, MemoryMapper};
//! # use ws281x_pwm::pin::GpioController;
//! # fn example<M: MemoryMapper, G: GpioController>(
//! #     mapper: M,
//! #     gpio: G,
//! #     hardware: Hardware,
//! # ) -> Result<()> {
//! let mut registry = PeripheralRegistry::new();
//! let mut driver = StripDriver::new(mapper, gpio, hardware, DriverKind::Pwm)?;
//! driver.set_strip(0, LedStrip::new(30), 18, StripType::WS2812, false)?;
//! driver.set_brightness(0, 128)?;
//! driver.initialize(&mut registry)?;
//!
//! driver.strip_mut(0).expect("strip 0 configured").set(0, 0x00FF_0000);
//! driver.render(RenderTarget::All)?;
//!
//! driver.stop(&mut registry)?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod channel;
pub mod clock;
pub mod control_block;
pub mod dma;
pub mod driver;
mod error;
pub mod encoder;
pub mod memmap;
pub mod pin;
pub mod pwm;
pub mod strip;

pub use crate::driver::{DriverKind, PeripheralRegistry, RenderTarget, StripDriver};
pub use crate::error::{Error, Result};
