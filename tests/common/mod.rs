//! Simulated platform services for driving the pipeline without hardware.
//!
//! `MockMapper` hands out in-memory register windows and records every map,
//! write, and unmap so tests can assert on register sequences. The clock
//! peripheral gets a tiny behavioral model: writing the enable bit raises
//! the busy flag, killing the clock clears it (disabled for timeout tests).

#![allow(dead_code, missing_docs)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;

use ws281x_pwm::Result;
use ws281x_pwm::clock::CLOCK_BUS_OFFSET;
use ws281x_pwm::memmap::{MemoryMapper, RegisterWindow};
use ws281x_pwm::pin::{GpioController, PinFunction};

pub const PAGE_SIZE: u32 = 4096;

static TRACING: Once = Once::new();

/// Route crate tracing to the test writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const CLK_PWM_CTL: u32 = 0xa0;
const CLK_CTL_ENAB: u32 = 1 << 4;
const CLK_CTL_BUSY: u32 = 1 << 7;

/// Where a simulated region came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegionKind {
    Peripheral { bus_offset: u32 },
    Uncached { len: u32, flags: u32 },
}

#[derive(Debug)]
pub struct Region {
    pub kind: RegionKind,
    pub bus_address: u32,
    pub words: HashMap<u32, u32>,
    /// Every `(offset, value)` write in order.
    pub writes: Vec<(u32, u32)>,
    pub mapped: bool,
}

impl Region {
    pub fn word(&self, offset: u32) -> u32 {
        self.words.get(&offset).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    pub regions: Vec<Region>,
    pub map_calls: usize,
    pub unmap_calls: usize,
    /// When false, the simulated clock never reports busy after enable.
    pub clock_becomes_ready: bool,
}

/// Shared handle to the simulated mapping service.
#[derive(Clone)]
pub struct MockMapper {
    state: Rc<RefCell<MockState>>,
}

impl MockMapper {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                clock_becomes_ready: true,
                ..MockState::default()
            })),
        }
    }

    pub fn with_stuck_clock() -> Self {
        let mapper = Self::new();
        mapper.state.borrow_mut().clock_becomes_ready = false;
        mapper
    }

    pub fn map_calls(&self) -> usize {
        self.state.borrow().map_calls
    }

    pub fn unmap_calls(&self) -> usize {
        self.state.borrow().unmap_calls
    }

    /// Index of the mapped peripheral region at `bus_offset`.
    pub fn peripheral_region(&self, bus_offset: u32) -> Option<usize> {
        self.state.borrow().regions.iter().position(|region| {
            region.mapped && region.kind == RegionKind::Peripheral { bus_offset }
        })
    }

    /// Indexes of currently mapped uncached regions, in map order.
    pub fn uncached_regions(&self) -> Vec<usize> {
        self.state
            .borrow()
            .regions
            .iter()
            .enumerate()
            .filter(|(_, region)| {
                region.mapped && matches!(region.kind, RegionKind::Uncached { .. })
            })
            .map(|(index, _)| index)
            .collect()
    }

    pub fn region_kind(&self, index: usize) -> RegionKind {
        self.state.borrow().regions[index].kind
    }

    pub fn bus_address(&self, index: usize) -> u32 {
        self.state.borrow().regions[index].bus_address
    }

    pub fn word(&self, index: usize, offset: u32) -> u32 {
        self.state.borrow().regions[index].word(offset)
    }

    pub fn writes(&self, index: usize) -> Vec<(u32, u32)> {
        self.state.borrow().regions[index].writes.clone()
    }

    pub fn is_mapped(&self, index: usize) -> bool {
        self.state.borrow().regions[index].mapped
    }
}

impl MemoryMapper for MockMapper {
    type Window = MockWindow;

    fn map_peripheral(&self, bus_offset: u32, _len: u32) -> Result<Self::Window> {
        self.map(RegionKind::Peripheral { bus_offset })
    }

    fn map_uncached(&self, len: u32, allocation_flags: u32) -> Result<Self::Window> {
        self.map(RegionKind::Uncached {
            len,
            flags: allocation_flags,
        })
    }

    fn page_size(&self) -> u32 {
        PAGE_SIZE
    }
}

impl MockMapper {
    fn map(&self, kind: RegionKind) -> Result<MockWindow> {
        let mut state = self.state.borrow_mut();
        state.map_calls += 1;
        let index = state.regions.len();
        state.regions.push(Region {
            kind,
            bus_address: 0xde00_0000 + index as u32 * 0x1_0000,
            words: HashMap::new(),
            writes: Vec::new(),
            mapped: true,
        });
        Ok(MockWindow {
            state: Rc::clone(&self.state),
            index,
        })
    }
}

/// One simulated register window.
pub struct MockWindow {
    state: Rc<RefCell<MockState>>,
    index: usize,
}

impl RegisterWindow for MockWindow {
    fn read(&self, offset: u32) -> u32 {
        self.state.borrow().regions[self.index].word(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        let mut state = self.state.borrow_mut();
        let clock_becomes_ready = state.clock_becomes_ready;
        let region = &mut state.regions[self.index];
        region.writes.push((offset, value));
        let mut stored = value;
        if region.kind == (RegionKind::Peripheral { bus_offset: CLOCK_BUS_OFFSET })
            && offset == CLK_PWM_CTL
        {
            // Behavioral clock model: busy follows the enable bit.
            if value & CLK_CTL_ENAB != 0 && clock_becomes_ready {
                stored |= CLK_CTL_BUSY;
            } else {
                stored &= !CLK_CTL_BUSY;
            }
        }
        region.words.insert(offset, stored);
    }

    fn bus_address(&self) -> u32 {
        self.state.borrow().regions[self.index].bus_address
    }

    fn unmap(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.unmap_calls += 1;
        state.regions[self.index].mapped = false;
        Ok(())
    }
}

/// Simulated GPIO service recording every call.
#[derive(Clone, Default)]
pub struct MockGpio {
    pub calls: Rc<RefCell<Vec<GpioCall>>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GpioCall {
    SetFunction(u32, PinFunction),
    WriteLevel(u32, bool),
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GpioCall> {
        self.calls.borrow().clone()
    }
}

impl GpioController for MockGpio {
    fn set_function(&mut self, pin: u32, function: PinFunction) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(GpioCall::SetFunction(pin, function));
        Ok(())
    }

    fn write_level(&mut self, pin: u32, high: bool) -> Result<()> {
        self.calls.borrow_mut().push(GpioCall::WriteLevel(pin, high));
        Ok(())
    }
}
