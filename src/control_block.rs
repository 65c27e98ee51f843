//! DMA control block manager.
//!
//! The pipeline uses exactly one control block: a single-shot, non-chained
//! copy from the encoded bit buffer to the PWM FIFO register, destination
//! paced by the PWM DREQ line. Its contents are written once at build time;
//! renders only rewrite the buffer the block points at, never the block
//! itself.

use tracing::debug;

use crate::memmap::{Hardware, MemoryMapper, RegisterWindow};
use crate::{Error, Result};

const CB_TI: u32 = 0;
const CB_SOURCE_AD: u32 = 4;
const CB_DEST_AD: u32 = 8;
const CB_TXFR_LEN: u32 = 12;
const CB_STRIDE: u32 = 16;
const CB_NEXT_CB: u32 = 20;

const TI_WAIT_RESP: u32 = 1 << 3;
const TI_DEST_DREQ: u32 = 1 << 6;
const TI_SRC_INC: u32 = 1 << 8;
const TI_NO_WIDE_BURSTS: u32 = 1 << 26;

/// DREQ line of the PWM peripheral.
const PERMAP_PWM: u32 = 5;

fn ti_permap(value: u32) -> u32 {
    (value & 0x1f) << 16
}

/// Owner of the pipeline's one reusable transfer descriptor.
pub struct ControlBlock<W> {
    window: Option<W>,
}

impl<W: RegisterWindow> ControlBlock<W> {
    /// Create an unbuilt manager.
    #[must_use]
    pub fn new() -> Self {
        Self { window: None }
    }

    /// Allocate the descriptor in uncached memory and write its fields:
    /// a 1D copy of `transfer_len` bytes from `source_bus_address` to
    /// `fifo_bus_address`, source-incrementing, destination paced by the PWM
    /// DREQ, no chaining.
    ///
    /// The allocation is one page; the descriptor needs 8 words but mappings
    /// round to page granularity anyway.
    pub fn build<M>(
        &mut self,
        mapper: &M,
        hardware: &Hardware,
        source_bus_address: u32,
        fifo_bus_address: u32,
        transfer_len: u32,
    ) -> Result<()>
    where
        M: MemoryMapper<Window = W>,
    {
        self.destroy()?;
        let mut window = mapper.map_uncached(mapper.page_size(), hardware.dma_allocation_flags())?;
        window.write(
            CB_TI,
            TI_NO_WIDE_BURSTS | TI_WAIT_RESP | TI_DEST_DREQ | TI_SRC_INC | ti_permap(PERMAP_PWM),
        );
        window.write(CB_SOURCE_AD, source_bus_address);
        window.write(CB_DEST_AD, fifo_bus_address);
        window.write(CB_TXFR_LEN, transfer_len);
        window.write(CB_STRIDE, 0);
        window.write(CB_NEXT_CB, 0);
        debug!(
            source_bus_address,
            fifo_bus_address, transfer_len, "DMA control block built"
        );
        self.window = Some(window);
        Ok(())
    }

    /// Bus address the DMA engine fetches the descriptor from.
    pub fn bus_address(&self) -> Result<u32> {
        self.window
            .as_ref()
            .map(RegisterWindow::bus_address)
            .ok_or(Error::NotInitialized)
    }

    /// Release the descriptor's memory.
    pub fn destroy(&mut self) -> Result<()> {
        if let Some(mut window) = self.window.take() {
            window.unmap()?;
        }
        Ok(())
    }
}

impl<W: RegisterWindow> Default for ControlBlock<W> {
    fn default() -> Self {
        Self::new()
    }
}
