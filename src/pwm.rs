//! PWM serializer controller.
//!
//! The serializer drains 32-bit FIFO words onto the output pins at the
//! reference clock rate, one bit-slot per clock. This module owns the PWM
//! register sequencing, the sizing of the uncached bit buffer the DMA engine
//! reads from, and the rebuild of the control block whenever the channel
//! configuration (and therefore the buffer) changes.

use std::fmt::Write as _;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::channel::Channel;
use crate::clock::ClockController;
use crate::control_block::ControlBlock;
use crate::encoder::BITS_PER_OUTPUT_BIT;
use crate::memmap::{Hardware, MemoryMapper, RegisterWindow};
use crate::{Error, Result};

/// Bus offset of the PWM register block.
pub const PWM_BUS_OFFSET: u32 = 0x0020_c000;

const PWM_CTL: u32 = 0x00;
const PWM_STA: u32 = 0x04;
const PWM_DMAC: u32 = 0x08;
const PWM_RNG1: u32 = 0x10;
const PWM_FIF1: u32 = 0x18;
const PWM_RNG2: u32 = 0x20;

const DMAC_ENAB: u32 = 1 << 31;

const CTL_PWEN1: u32 = 1 << 0;
const CTL_MODE1: u32 = 1 << 1;
const CTL_RPTL1: u32 = 1 << 2;
const CTL_POLA1: u32 = 1 << 4;
const CTL_USEF1: u32 = 1 << 5;
const CTL_CLRF1: u32 = 1 << 6;
const CTL_MSEN1: u32 = 1 << 7;
const CTL_PWEN2: u32 = 1 << 8;
const CTL_MODE2: u32 = 1 << 9;
const CTL_RPTL2: u32 = 1 << 10;
const CTL_POLA2: u32 = 1 << 12;
const CTL_USEF2: u32 = 1 << 13;
const CTL_MSEN2: u32 = 1 << 15;

const STA_BERR: u32 = 1 << 8;
const STA_STA1: u32 = 1 << 9;
const STA_STA2: u32 = 1 << 10;

fn dmac_panic(value: u32) -> u32 {
    (value & 0xff) << 8
}

fn dmac_dreq(value: u32) -> u32 {
    value & 0xff
}

const SETTLE: Duration = Duration::from_micros(10);

/// Bytes of encoded data one channel needs in the DMA buffer.
///
/// Eight protocol bits per color byte, three buffer bits per protocol bit,
/// rounded and padded with the empirically required +8/+32 bytes — a
/// compatibility constant, not derived from protocol timing.
fn channel_data_bytes(led_count: usize, color_count: usize) -> u32 {
    let bit_count = led_count as u32 * color_count as u32 * 8 * BITS_PER_OUTPUT_BIT;
    ((bit_count >> 3) & !0x7) + 8 + 32
}

/// Driver for the PWM peripheral and owner of the encoded-data buffer.
pub struct PwmController<W> {
    registers: Option<W>,
    data: Option<W>,
    active_channels: u32,
    always_two_channels: bool,
}

impl<W: RegisterWindow> PwmController<W> {
    /// Create an unmapped controller.
    ///
    /// With `always_two_channels` set, both sub-channels are configured and
    /// the buffer sized for two streams no matter how many strips are
    /// registered.
    #[must_use]
    pub fn new(always_two_channels: bool) -> Self {
        Self {
            registers: None,
            data: None,
            active_channels: 0,
            always_two_channels,
        }
    }

    /// Number of sub-channels the current configuration drives.
    #[must_use]
    pub fn active_channels(&self) -> u32 {
        self.active_channels
    }

    /// Force two-channel configuration and buffer sizing.
    pub fn set_always_two_channels(&mut self, enabled: bool) {
        self.always_two_channels = enabled;
    }

    /// Configure clock, serializer, data buffer, and control block for
    /// `channels` at `frequency_hz`.
    pub(crate) fn initialize<M>(
        &mut self,
        mapper: &M,
        hardware: &Hardware,
        clock: &mut ClockController<W>,
        control_block: &mut ControlBlock<W>,
        channels: &[Option<Channel>; 2],
        frequency_hz: u32,
    ) -> Result<()>
    where
        M: MemoryMapper<Window = W>,
    {
        clock.initialize(mapper)?;
        clock.setup_for_frequency(hardware, frequency_hz)?;

        if self.registers.is_none() {
            self.registers = Some(mapper.map_peripheral(PWM_BUS_OFFSET, mapper.page_size())?);
            debug!("PWM register window mapped");
        }
        let registers = self.registers.as_mut().ok_or(Error::NotInitialized)?;

        // The serializer always emits full words: 32 bit-slots per FIFO word.
        registers.write(PWM_RNG1, 32);
        registers.write(PWM_RNG2, 32);
        thread::sleep(SETTLE);
        registers.write(PWM_CTL, CTL_CLRF1);
        thread::sleep(SETTLE);
        registers.write(PWM_DMAC, DMAC_ENAB | dmac_panic(7) | dmac_dreq(3));
        thread::sleep(SETTLE);

        let mut ctl = 0;
        if channels[0].is_some() || self.always_two_channels {
            ctl |= CTL_USEF1 | CTL_MODE1;
            if channels[0].as_ref().is_some_and(|channel| channel.invert) {
                ctl |= CTL_POLA1;
            }
        }
        if channels[1].is_some() || self.always_two_channels {
            ctl |= CTL_USEF2 | CTL_MODE2;
            if channels[1].as_ref().is_some_and(|channel| channel.invert) {
                ctl |= CTL_POLA2;
            }
        }
        registers.write(PWM_CTL, ctl);
        thread::sleep(SETTLE);
        let mut enable = registers.read(PWM_CTL);
        if channels[0].is_some() || self.always_two_channels {
            enable |= CTL_PWEN1;
        }
        if channels[1].is_some() || self.always_two_channels {
            enable |= CTL_PWEN2;
        }
        registers.write(PWM_CTL, enable);
        thread::sleep(SETTLE);

        if let Some(mut old) = self.data.take() {
            debug!("releasing previous PWM data buffer");
            old.unmap()?;
        }

        self.active_channels = 0;
        let mut channel_bytes = 0;
        for channel in channels.iter().flatten() {
            // The larger channel is the reference.
            channel_bytes = channel_bytes.max(channel_data_bytes(
                channel.strip.len(),
                channel.strip_type.color_count(),
            ));
            self.active_channels += 1;
        }
        if self.always_two_channels {
            self.active_channels = 2;
        }
        let data_size = channel_bytes * self.active_channels;
        debug!(data_size, "allocating PWM data buffer");
        let data = mapper.map_uncached(data_size, hardware.dma_allocation_flags())?;

        let registers = self.registers.as_ref().ok_or(Error::NotInitialized)?;
        control_block.build(
            mapper,
            hardware,
            data.bus_address(),
            registers.bus_address() + PWM_FIF1,
            data_size,
        )?;
        self.data = Some(data);
        Ok(())
    }

    /// The uncached buffer the encoder writes into.
    pub fn data_mut(&mut self) -> Result<&mut W> {
        self.data.as_mut().ok_or(Error::NotInitialized)
    }

    /// Zero the PWM control register and stop the reference clock. No-op
    /// while unmapped.
    pub fn stop(&mut self, clock: &mut ClockController<W>) -> Result<()> {
        let Some(registers) = self.registers.as_mut() else {
            return Ok(());
        };
        registers.write(PWM_CTL, 0);
        clock.stop()
    }

    /// Stop output and release registers, data buffer, and control block.
    pub fn cleanup(
        &mut self,
        clock: &mut ClockController<W>,
        control_block: &mut ControlBlock<W>,
    ) -> Result<()> {
        self.stop(clock)?;
        if let Some(mut registers) = self.registers.take() {
            registers.unmap()?;
        }
        if let Some(mut data) = self.data.take() {
            data.unmap()?;
        }
        control_block.destroy()?;
        self.active_channels = 0;
        Ok(())
    }

    /// Human-readable dump of serializer configuration and status bits.
    /// Informational only.
    #[must_use]
    pub fn status(&self) -> Option<String> {
        let registers = self.registers.as_ref()?;
        let sta = registers.read(PWM_STA);
        let ctl = registers.read(PWM_CTL);
        let mut out = String::new();
        let _ = writeln!(out, "PWM Status:");
        let _ = writeln!(out, "\tChan1: {}", sta & STA_STA1 != 0);
        let _ = writeln!(out, "\tChan2: {}", sta & STA_STA2 != 0);
        let _ = writeln!(out, "\tBuserror: {}", sta & STA_BERR != 0);
        for (name, pwen, mode, rptl, pola, usef, msen) in [
            ("PWM Chan 1", CTL_PWEN1, CTL_MODE1, CTL_RPTL1, CTL_POLA1, CTL_USEF1, CTL_MSEN1),
            ("PWM Chan 2", CTL_PWEN2, CTL_MODE2, CTL_RPTL2, CTL_POLA2, CTL_USEF2, CTL_MSEN2),
        ] {
            let _ = writeln!(out, "{name}:");
            let _ = writeln!(out, "\tEnabled: {}", ctl & pwen != 0);
            let _ = writeln!(out, "\tUse Serialiser: {}", ctl & mode != 0);
            let _ = writeln!(out, "\tRepeat: {}", ctl & rptl != 0);
            let _ = writeln!(out, "\tInverse: {}", ctl & pola != 0);
            let _ = writeln!(out, "\tUse Fifo: {}", ctl & usef != 0);
            let _ = writeln!(out, "\tUse M/S: {}", ctl & msen != 0);
        }
        Some(out)
    }
}
