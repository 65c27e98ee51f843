//! The consumed memory-mapping capability and host hardware description.
//!
//! All register access in this crate goes through [`RegisterWindow`], a
//! word-addressable view of one mapped physical range. Two kinds of windows
//! are used: *peripheral* windows (cached, synchronous register access) and
//! *uncached* windows (DMA data buffers and control blocks, which the DMA
//! engine must observe without cache-coherency delays). Keeping the raw
//! pointer work behind these traits leaves the encoder and sequencing logic
//! purely algorithmic and lets tests substitute simulated memory.

use crate::Result;

/// One mapped window of physical memory.
///
/// All offsets are byte offsets from the window base and must be 32-bit
/// aligned. Implementations for uncached windows guarantee that a completed
/// [`write`](Self::write) is visible to the DMA engine with no further
/// flushing.
pub trait RegisterWindow {
    /// Read the 32-bit word at `offset`.
    fn read(&self, offset: u32) -> u32;

    /// Write the 32-bit word at `offset`.
    fn write(&mut self, offset: u32, value: u32);

    /// Replace the bits selected by `mask` with the corresponding bits of
    /// `value`, leaving the rest of the word untouched.
    fn modify(&mut self, offset: u32, mask: u32, value: u32) {
        let current = self.read(offset);
        self.write(offset, (current & !mask) | (value & mask));
    }

    /// The address the DMA engine uses to reach the start of this window.
    fn bus_address(&self) -> u32;

    /// Release the mapping. The window must not be used afterwards.
    fn unmap(&mut self) -> Result<()>;
}

/// Factory for register windows, implemented by the platform mapping service.
pub trait MemoryMapper {
    /// Window type produced by this mapper.
    type Window: RegisterWindow;

    /// Map the peripheral register block at `bus_offset` (relative to the
    /// peripheral bus base) with at least `len` bytes.
    fn map_peripheral(&self, bus_offset: u32, len: u32) -> Result<Self::Window>;

    /// Allocate and map `len` bytes of uncached, DMA-visible memory.
    ///
    /// `allocation_flags` selects the platform allocation mode; see
    /// [`Hardware::dma_allocation_flags`]. The length is rounded up to the
    /// page granularity by the mapping service.
    fn map_uncached(&self, len: u32, allocation_flags: u32) -> Result<Self::Window>;

    /// Platform page size in bytes, the granularity of all mappings.
    fn page_size(&self) -> u32;
}

/// Host identification supplied by the hardware-detection service.
#[derive(Clone, Copy, Debug)]
pub struct Hardware {
    /// Oscillator frequency in Hz, the PWM clock source (19.2 MHz on
    /// BCM283x boards).
    pub oscillator_hz: u32,
    /// Board generation, which selects the DMA memory allocation mode.
    pub board: BoardGeneration,
}

/// Board generations that differ in DMA memory allocation behavior.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoardGeneration {
    /// First-generation boards, which need L1-non-allocating coherent
    /// allocations.
    Legacy,
    /// Everything later: direct allocations with no L2 cache alias.
    Current,
}

impl Hardware {
    /// Mailbox allocation flags for uncached DMA memory on this board.
    #[must_use]
    pub fn dma_allocation_flags(&self) -> u32 {
        match self.board {
            BoardGeneration::Legacy => 0xc,
            BoardGeneration::Current => 0x4,
        }
    }
}
