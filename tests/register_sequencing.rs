//! Register-level tests for the individual peripheral controllers.

mod common;

use std::time::Duration;

use common::{MockMapper, MockWindow, RegionKind};
use ws281x_pwm::Error;
use ws281x_pwm::clock::{CLOCK_BUS_OFFSET, ClockController};
use ws281x_pwm::control_block::ControlBlock;
use ws281x_pwm::dma::{DMA_BUS_OFFSET, DMA_CHANNEL_COUNT, DmaController, check_channel};
use ws281x_pwm::memmap::{BoardGeneration, Hardware};

const TIMEOUT: Duration = Duration::from_millis(100);

fn hardware(board: BoardGeneration) -> Hardware {
    Hardware {
        oscillator_hz: 19_200_000,
        board,
    }
}

#[test]
fn clock_initialize_is_idempotent() {
    common::init_tracing();
    let mapper = MockMapper::new();
    let mut clock = ClockController::<MockWindow>::new(TIMEOUT);
    clock.initialize(&mapper).unwrap();
    clock.initialize(&mapper).unwrap();
    assert_eq!(mapper.map_calls(), 1);
}

#[test]
fn clock_stop_before_initialize_is_a_no_op() {
    let mut clock = ClockController::<MockWindow>::new(TIMEOUT);
    clock.stop().unwrap();
    clock.cleanup().unwrap();
}

#[test]
fn clock_cleanup_unmaps_and_allows_reinitialize() {
    let mapper = MockMapper::new();
    let mut clock = ClockController::<MockWindow>::new(TIMEOUT);
    clock.initialize(&mapper).unwrap();
    clock.cleanup().unwrap();
    assert_eq!(mapper.unmap_calls(), 1);
    clock.initialize(&mapper).unwrap();
    assert_eq!(mapper.map_calls(), 2);
}

#[test]
fn clock_divisor_scales_with_data_rate() {
    let mapper = MockMapper::new();
    let mut clock = ClockController::<MockWindow>::new(TIMEOUT);
    clock.initialize(&mapper).unwrap();
    // 19.2 MHz / (3 x 400 kHz) = 16.
    clock
        .setup_for_frequency(&hardware(BoardGeneration::Current), 400_000)
        .unwrap();

    let region = mapper.peripheral_region(CLOCK_BUS_OFFSET).unwrap();
    let div_writes: Vec<u32> = mapper
        .writes(region)
        .into_iter()
        .filter(|(offset, _)| *offset == 0xa4)
        .map(|(_, value)| value)
        .collect();
    assert_eq!(div_writes, vec![0x5a01_0000]);
}

#[test]
fn clock_restart_kills_the_running_clock_first() {
    let mapper = MockMapper::new();
    let mut clock = ClockController::<MockWindow>::new(TIMEOUT);
    clock.initialize(&mapper).unwrap();
    let hardware = hardware(BoardGeneration::Current);
    clock.setup_for_frequency(&hardware, 800_000).unwrap();
    clock.setup_for_frequency(&hardware, 400_000).unwrap();

    let region = mapper.peripheral_region(CLOCK_BUS_OFFSET).unwrap();
    let ctl_writes: Vec<u32> = mapper
        .writes(region)
        .into_iter()
        .filter(|(offset, _)| *offset == 0xa0)
        .map(|(_, value)| value)
        .collect();
    assert_eq!(
        ctl_writes,
        vec![
            0x5a00_0020, // kill
            0x5a00_0001, // oscillator source
            0x5a00_0011, // + enable
            0x5a00_0020, // kill again before the new divisor
            0x5a00_0001,
            0x5a00_0011,
        ]
    );
}

#[test]
fn stuck_clock_times_out_instead_of_hanging() {
    let mapper = MockMapper::with_stuck_clock();
    let mut clock = ClockController::<MockWindow>::new(Duration::from_millis(2));
    clock.initialize(&mapper).unwrap();
    let result = clock.setup_for_frequency(&hardware(BoardGeneration::Current), 800_000);
    assert!(matches!(
        result,
        Err(Error::ClockTimeout { timeout }) if timeout == Duration::from_millis(2)
    ));
}

#[test]
fn dma_channel_bounds_are_enforced() {
    check_channel(0).unwrap();
    check_channel(DMA_CHANNEL_COUNT - 1).unwrap();
    assert!(matches!(
        check_channel(DMA_CHANNEL_COUNT),
        Err(Error::DmaChannelOutOfRange {
            channel: 15,
            limit: 15
        })
    ));
}

#[test]
fn dma_enable_and_disable_preserve_other_channels() {
    let mapper = MockMapper::new();
    let mut dma = DmaController::<MockWindow>::new();
    dma.initialize(&mapper).unwrap();
    dma.enable(3).unwrap();
    dma.enable(10).unwrap();

    let region = mapper.peripheral_region(DMA_BUS_OFFSET).unwrap();
    assert_eq!(mapper.word(region, 0xff0), (1 << 3) | (1 << 10));

    dma.disable(3).unwrap();
    assert_eq!(mapper.word(region, 0xff0), 1 << 10);
}

#[test]
fn dma_trigger_requires_a_mapped_window() {
    let mut dma = DmaController::<MockWindow>::new();
    assert!(matches!(
        dma.trigger(10, 0xde00_0000),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn dma_trigger_sequences_channel_registers() {
    let mapper = MockMapper::new();
    let mut dma = DmaController::<MockWindow>::new();
    dma.initialize(&mapper).unwrap();
    dma.trigger(3, 0x1234_5680).unwrap();

    let region = mapper.peripheral_region(DMA_BUS_OFFSET).unwrap();
    assert_eq!(
        mapper.writes(region),
        vec![
            (0x300, 0x8000_0000),
            (0x300, 0x6),
            (0x304, 0x1234_5680),
            (0x320, 7),
            (0x300, 0x10ff_0000),
            (0x300, 0x10ff_0001),
        ]
    );
}

#[test]
fn control_block_build_writes_descriptor_fields() {
    let mapper = MockMapper::new();
    let mut block = ControlBlock::<MockWindow>::new();
    assert!(matches!(block.bus_address(), Err(Error::NotInitialized)));

    block
        .build(
            &mapper,
            &hardware(BoardGeneration::Current),
            0x4000_0000,
            0x7e20_c018,
            96,
        )
        .unwrap();

    let regions = mapper.uncached_regions();
    assert_eq!(regions.len(), 1);
    let region = regions[0];
    assert_eq!(
        mapper.region_kind(region),
        RegionKind::Uncached {
            len: common::PAGE_SIZE,
            flags: 0x4
        }
    );
    assert_eq!(mapper.word(region, 0), 0x0405_0148);
    assert_eq!(mapper.word(region, 4), 0x4000_0000);
    assert_eq!(mapper.word(region, 8), 0x7e20_c018);
    assert_eq!(mapper.word(region, 12), 96);
    assert_eq!(mapper.word(region, 16), 0);
    assert_eq!(mapper.word(region, 20), 0);
    assert_eq!(block.bus_address().unwrap(), mapper.bus_address(region));
}

#[test]
fn control_block_rebuild_releases_the_old_descriptor() {
    let mapper = MockMapper::new();
    let mut block = ControlBlock::<MockWindow>::new();
    let hardware = hardware(BoardGeneration::Legacy);
    block.build(&mapper, &hardware, 0x4000_0000, 0x7e20_c018, 48).unwrap();
    block.build(&mapper, &hardware, 0x4000_1000, 0x7e20_c018, 96).unwrap();

    assert_eq!(mapper.unmap_calls(), 1);
    let regions = mapper.uncached_regions();
    assert_eq!(regions.len(), 1);
    // Older boards need different allocation flags for coherent memory.
    assert_eq!(
        mapper.region_kind(regions[0]),
        RegionKind::Uncached {
            len: common::PAGE_SIZE,
            flags: 0xc
        }
    );

    block.destroy().unwrap();
    block.destroy().unwrap();
    assert_eq!(mapper.unmap_calls(), 2);
}
