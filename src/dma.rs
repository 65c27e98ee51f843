//! DMA engine controller.
//!
//! One channel of the DMA engine moves the encoded bit buffer into the PWM
//! FIFO, paced by the FIFO's DREQ line. The engine reads its transfer
//! description from a [control block](crate::control_block); triggering a
//! transfer is a fixed register sequence with mandatory settle delays —
//! back-to-back peripheral bus writes can be dropped or reordered without
//! them, which shows up as intermittent missing frames on real hardware.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::memmap::{MemoryMapper, RegisterWindow};
use crate::{Error, Result};

/// Bus offset of the DMA register block.
pub const DMA_BUS_OFFSET: u32 = 0x0000_7000;

/// Usable DMA channels on BCM283x (0 through 14).
pub const DMA_CHANNEL_COUNT: u32 = 15;

const DMA_CS: u32 = 0x00;
const DMA_CONBLK_AD: u32 = 0x04;
const DMA_DEBUG: u32 = 0x20;
const DMA_ENABLE: u32 = 0xff0;

const DMA_CS_RESET: u32 = 1 << 31;
const DMA_CS_WAIT_OUTSTANDING_WRITES: u32 = 1 << 28;
const DMA_CS_INT: u32 = 1 << 2;
const DMA_CS_END: u32 = 1 << 1;
const DMA_CS_ACTIVE: u32 = 1 << 0;

fn dma_cs_panic_priority(value: u32) -> u32 {
    (value & 0xf) << 20
}

fn dma_cs_priority(value: u32) -> u32 {
    (value & 0xf) << 16
}

/// Byte offset of `register` within `channel`'s register set.
fn channel_register(channel: u32, register: u32) -> u32 {
    channel * 0x100 + register
}

const SETTLE: Duration = Duration::from_micros(10);
const LATCH: Duration = Duration::from_micros(20);

/// Validate a channel index against the platform channel count.
pub fn check_channel(channel: u32) -> Result<()> {
    if channel >= DMA_CHANNEL_COUNT {
        return Err(Error::DmaChannelOutOfRange {
            channel,
            limit: DMA_CHANNEL_COUNT,
        });
    }
    Ok(())
}

/// Driver for the DMA engine register block.
pub struct DmaController<W> {
    window: Option<W>,
}

impl<W: RegisterWindow> DmaController<W> {
    /// Create an unmapped controller.
    #[must_use]
    pub fn new() -> Self {
        Self { window: None }
    }

    /// Map the DMA register window. A second call is a no-op.
    pub fn initialize<M>(&mut self, mapper: &M) -> Result<()>
    where
        M: MemoryMapper<Window = W>,
    {
        if self.window.is_some() {
            return Ok(());
        }
        self.window = Some(mapper.map_peripheral(DMA_BUS_OFFSET, mapper.page_size())?);
        debug!("DMA register window mapped");
        Ok(())
    }

    /// Set `channel`'s bit in the global enable register. No-op while
    /// unmapped.
    pub fn enable(&mut self, channel: u32) -> Result<()> {
        check_channel(channel)?;
        if let Some(window) = self.window.as_mut() {
            let enabled = window.read(DMA_ENABLE);
            window.write(DMA_ENABLE, enabled | (1 << channel));
        }
        Ok(())
    }

    /// Clear `channel`'s bit in the global enable register. No-op while
    /// unmapped.
    pub fn disable(&mut self, channel: u32) -> Result<()> {
        check_channel(channel)?;
        if let Some(window) = self.window.as_mut() {
            let enabled = window.read(DMA_ENABLE);
            window.write(DMA_ENABLE, enabled & !(1 << channel));
        }
        Ok(())
    }

    /// Reset `channel`. The peripheral defines reset as immediate, so this
    /// does not wait. No-op while unmapped.
    pub fn reset(&mut self, channel: u32) -> Result<()> {
        check_channel(channel)?;
        if let Some(window) = self.window.as_mut() {
            window.write(channel_register(channel, DMA_CS), DMA_CS_RESET);
        }
        Ok(())
    }

    /// Start the transfer described by the control block at
    /// `control_block_bus_address` on `channel`.
    ///
    /// Sequence: reset, settle, clear interrupt/end flags, settle, load the
    /// control-block address, clear the debug error bits (value 7, per
    /// peripheral errata), program priorities, assert active, then give the
    /// engine 20 µs to latch and begin fetching.
    pub fn trigger(&mut self, channel: u32, control_block_bus_address: u32) -> Result<()> {
        check_channel(channel)?;
        self.reset(channel)?;
        let window = self.window.as_mut().ok_or(Error::NotInitialized)?;
        thread::sleep(SETTLE);
        window.write(
            channel_register(channel, DMA_CS),
            DMA_CS_INT | DMA_CS_END,
        );
        thread::sleep(SETTLE);
        window.write(
            channel_register(channel, DMA_CONBLK_AD),
            control_block_bus_address,
        );
        window.write(channel_register(channel, DMA_DEBUG), 7);
        window.write(
            channel_register(channel, DMA_CS),
            DMA_CS_WAIT_OUTSTANDING_WRITES | dma_cs_panic_priority(15) | dma_cs_priority(15),
        );
        let status = window.read(channel_register(channel, DMA_CS));
        window.write(channel_register(channel, DMA_CS), status | DMA_CS_ACTIVE);
        thread::sleep(LATCH);
        debug!(channel, control_block_bus_address, "DMA transfer triggered");
        Ok(())
    }

    /// Unmap the register window.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(mut window) = self.window.take() {
            window.unmap()?;
        }
        Ok(())
    }
}

impl<W: RegisterWindow> Default for DmaController<W> {
    fn default() -> Self {
        Self::new()
    }
}
