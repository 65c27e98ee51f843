//! Strip configuration and render orchestration.
//!
//! [`StripDriver`] is the owned handle for one signal-generation pipeline:
//! it carries the consumed services (memory mapper, GPIO), the per-channel
//! strip configuration, and the clock/DMA/PWM controllers. The hardware
//! behind a pipeline is a process-wide singleton, so a [`PeripheralRegistry`]
//! — created once by the application — arbitrates which configuration may
//! hold each peripheral type at a time.
//!
//! Rendering is single-threaded and blocking by design: the hardware cannot
//! abort a frame mid-transfer, so the only backpressure is waiting out the
//! previous frame's wire time plus the strip's latch interval before
//! encoding the next one.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::channel::Channel;
use crate::clock::ClockController;
use crate::control_block::ControlBlock;
use crate::dma::{self, DmaController};
use crate::encoder::{self, GammaTable};
use crate::memmap::{Hardware, MemoryMapper};
use crate::pin::{self, GpioController, PinFunction};
use crate::pwm::PwmController;
use crate::strip::{Leds, StripType};
use crate::{Error, Result};

/// Strips the hardware must hold the line low after a frame before it
/// latches, plus margin.
const RESET_LATCH: Duration = Duration::from_micros(300);

/// Sub-channels the PWM peripheral provides.
const PWM_CHANNEL_COUNT: usize = 2;

const DEFAULT_FREQUENCY_HZ: u32 = 800_000;
const DEFAULT_DMA_CHANNEL: u32 = 10;
const DEFAULT_CLOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial peripherals that can generate the strip protocol.
///
/// Only [`Pwm`](Self::Pwm) is implemented; the PCM and SPI paths are
/// placeholders and are rejected at construction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DriverKind {
    /// The PWM serializer path (two output channels).
    Pwm,
    /// PCM path, not implemented.
    Pcm,
    /// SPI path, not implemented.
    Spi,
}

/// Which strip(s) a render call outputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenderTarget {
    /// Render every registered strip.
    All,
    /// Render one strip by its channel index.
    Strip(usize),
}

/// Arbiter of the process-wide peripheral singletons.
///
/// Create one per application and pass it to
/// [`StripDriver::initialize`]/[`StripDriver::stop`]. A second configuration
/// asking for a peripheral type that is already held is rejected instead of
/// silently sharing hardware state.
#[derive(Debug, Default)]
pub struct PeripheralRegistry {
    pwm_active: bool,
    pcm_active: bool,
    spi_active: bool,
}

impl PeripheralRegistry {
    /// Create a registry with every peripheral free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if a configuration currently holds `kind`.
    #[must_use]
    pub fn is_active(&self, kind: DriverKind) -> bool {
        match kind {
            DriverKind::Pwm => self.pwm_active,
            DriverKind::Pcm => self.pcm_active,
            DriverKind::Spi => self.spi_active,
        }
    }

    fn acquire(&mut self, kind: DriverKind) -> Result<()> {
        let flag = self.flag_mut(kind);
        if *flag {
            return Err(Error::DriverAlreadyActive);
        }
        *flag = true;
        Ok(())
    }

    fn release(&mut self, kind: DriverKind) {
        *self.flag_mut(kind) = false;
    }

    fn flag_mut(&mut self, kind: DriverKind) -> &mut bool {
        match kind {
            DriverKind::Pwm => &mut self.pwm_active,
            DriverKind::Pcm => &mut self.pcm_active,
            DriverKind::Spi => &mut self.spi_active,
        }
    }
}

/// One configured signal-generation pipeline.
///
/// Construction and the setters only record configuration; no hardware is
/// touched until [`initialize`](Self::initialize). All configuration errors
/// are rejected synchronously before any register write.
///
/// Renders mutate the shared DMA buffer without internal locking; callers
/// must not issue overlapping [`render`](Self::render) calls.
pub struct StripDriver<M: MemoryMapper, G: GpioController> {
    mapper: M,
    gpio: G,
    hardware: Hardware,
    kind: DriverKind,
    dma_channel: u32,
    frequency_hz: u32,
    channels: [Option<Channel>; 2],
    gamma: GammaTable,
    initialized: bool,
    clock: ClockController<M::Window>,
    dma: DmaController<M::Window>,
    pwm: PwmController<M::Window>,
    control_block: ControlBlock<M::Window>,
    minimum_interval: Duration,
    previous_render: Option<Instant>,
}

impl<M: MemoryMapper, G: GpioController> StripDriver<M, G> {
    /// Create a driver for `kind` over the supplied platform services.
    ///
    /// Defaults: 800 kHz output, DMA channel 10, full brightness, identity
    /// gamma.
    ///
    /// # Errors
    ///
    /// [`Error::DriverNotSupported`] unless `kind` is [`DriverKind::Pwm`].
    pub fn new(mapper: M, gpio: G, hardware: Hardware, kind: DriverKind) -> Result<Self> {
        if kind != DriverKind::Pwm {
            return Err(Error::DriverNotSupported);
        }
        Ok(Self {
            mapper,
            gpio,
            hardware,
            kind,
            dma_channel: DEFAULT_DMA_CHANNEL,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            channels: [None, None],
            gamma: GammaTable::linear(),
            initialized: false,
            clock: ClockController::new(DEFAULT_CLOCK_TIMEOUT),
            dma: DmaController::new(),
            pwm: PwmController::new(false),
            control_block: ControlBlock::new(),
            minimum_interval: Duration::ZERO,
            previous_render: None,
        })
    }

    /// Use a different DMA channel (default 10). Pick distinct channels for
    /// configurations that render concurrently.
    pub fn set_dma_channel(&mut self, channel: u32) -> Result<()> {
        self.reject_if_initialized()?;
        dma::check_channel(channel)?;
        self.dma_channel = channel;
        Ok(())
    }

    /// Set the output data rate. Valid values are 400000 and 800000 Hz.
    pub fn set_frequency(&mut self, frequency_hz: u32) -> Result<()> {
        self.reject_if_initialized()?;
        if frequency_hz != 400_000 && frequency_hz != 800_000 {
            return Err(Error::InvalidFrequency(frequency_hz));
        }
        self.frequency_hz = frequency_hz;
        Ok(())
    }

    /// Bound the clock start/stop busy-waits (default 100 ms).
    pub fn set_clock_timeout(&mut self, timeout: Duration) {
        self.clock.set_timeout(timeout);
    }

    /// Replace the gamma correction table (default identity).
    pub fn set_gamma(&mut self, gamma: GammaTable) {
        self.gamma = gamma;
    }

    /// Configure both sub-channels even when only one strip is registered.
    pub fn set_always_two_channels(&mut self, enabled: bool) -> Result<()> {
        self.reject_if_initialized()?;
        self.pwm.set_always_two_channels(enabled);
        Ok(())
    }

    /// Register `strip` on channel `index` (0 or 1), output on GPIO `pin`.
    ///
    /// The pin must carry the PWM alternate function for that sub-channel.
    /// `invert` flips the output polarity in hardware.
    pub fn set_strip(
        &mut self,
        index: usize,
        strip: impl Leds + 'static,
        pin: u32,
        strip_type: StripType,
        invert: bool,
    ) -> Result<()> {
        self.reject_if_initialized()?;
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(Error::StripIndexOutOfRange {
                index,
                limit: PWM_CHANNEL_COUNT,
            })?;
        if pin::pwm_alt_function(index, pin).is_none() {
            return Err(Error::PinNotSupported {
                pin,
                channel: index,
            });
        }
        *channel = Some(Channel {
            strip_type,
            strip: Box::new(strip),
            pin,
            invert,
            brightness: 255,
        });
        Ok(())
    }

    /// Set channel `index`'s brightness (0-255, applied as a
    /// `(brightness + 1) / 256` scale). Allowed while initialized.
    pub fn set_brightness(&mut self, index: usize, brightness: u8) -> Result<()> {
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(Error::StripIndexOutOfRange {
                index,
                limit: PWM_CHANNEL_COUNT,
            })?;
        let channel = channel.as_mut().ok_or(Error::NoActiveChannel)?;
        channel.brightness = brightness;
        debug!(index, brightness, "brightness updated");
        Ok(())
    }

    /// The color source registered on channel `index`, if any.
    #[must_use]
    pub fn strip(&self, index: usize) -> Option<&dyn Leds> {
        self.channels
            .get(index)?
            .as_ref()
            .map(|channel| channel.strip.as_ref())
    }

    /// Mutable access to the color source on channel `index`, if any.
    pub fn strip_mut(&mut self, index: usize) -> Option<&mut dyn Leds> {
        match self.channels.get_mut(index)?.as_mut() {
            Some(channel) => Some(channel.strip.as_mut()),
            None => None,
        }
    }

    /// Bring up the pipeline: DMA window and channel, reference clock, PWM
    /// serializer, data buffer, control block, and pin muxing.
    ///
    /// A second call on an initialized driver is a no-op. Another driver
    /// already holding the peripheral in `registry` is an error.
    pub fn initialize(&mut self, registry: &mut PeripheralRegistry) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.channels.iter().all(Option::is_none) {
            return Err(Error::NoActiveChannel);
        }
        self.dma.initialize(&self.mapper)?;
        self.dma.enable(self.dma_channel)?;
        registry.acquire(self.kind)?;
        if let Err(error) = self.initialize_pwm_path() {
            registry.release(self.kind);
            return Err(error);
        }
        self.initialized = true;
        debug!(frequency_hz = self.frequency_hz, "pipeline initialized");
        Ok(())
    }

    fn initialize_pwm_path(&mut self) -> Result<()> {
        self.pwm.initialize(
            &self.mapper,
            &self.hardware,
            &mut self.clock,
            &mut self.control_block,
            &self.channels,
            self.frequency_hz,
        )?;
        for (index, channel) in self.channels.iter().enumerate() {
            let Some(channel) = channel else { continue };
            // Validated in set_strip.
            let function =
                pin::pwm_alt_function(index, channel.pin).ok_or(Error::PinNotSupported {
                    pin: channel.pin,
                    channel: index,
                })?;
            self.gpio.set_function(channel.pin, function)?;
        }
        Ok(())
    }

    /// Encode the selected strip(s) and trigger the DMA transfer.
    ///
    /// Blocks first until the previous frame's minimum interval (wire time
    /// plus the 300 µs reset/latch margin) has elapsed, then returns the new
    /// minimum interval to the next render.
    pub fn render(&mut self, target: RenderTarget) -> Result<Duration> {
        if let RenderTarget::Strip(index) = target {
            if index >= PWM_CHANNEL_COUNT {
                return Err(Error::StripIndexOutOfRange {
                    index,
                    limit: PWM_CHANNEL_COUNT,
                });
            }
        }
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        if let Some(previous) = self.previous_render {
            let elapsed = previous.elapsed();
            if elapsed < self.minimum_interval {
                thread::sleep(self.minimum_interval - elapsed);
            }
        }

        let selection: Vec<(usize, &Channel)> = match target {
            RenderTarget::All => self
                .channels
                .iter()
                .enumerate()
                .filter_map(|(index, channel)| channel.as_ref().map(|channel| (index, channel)))
                .collect(),
            RenderTarget::Strip(index) => self.channels[index]
                .as_ref()
                .map(|channel| (index, channel))
                .into_iter()
                .collect(),
        };
        let interleaved = self.pwm.active_channels() == 2;
        let transmission = encoder::encode(
            self.pwm.data_mut()?,
            &selection,
            &self.gamma,
            self.frequency_hz,
            interleaved,
        );
        self.minimum_interval = transmission + RESET_LATCH;

        self.dma
            .trigger(self.dma_channel, self.control_block.bus_address()?)?;
        self.previous_render = Some(Instant::now());
        Ok(self.minimum_interval)
    }

    /// Diagnostic dump of the PWM register state, or `None` while the
    /// registers are unmapped.
    #[must_use]
    pub fn status(&self) -> Option<String> {
        self.pwm.status()
    }

    /// Tear the pipeline down and release the peripheral in `registry`.
    ///
    /// Output pins return to plain output driven low. The DMA channel stays
    /// enabled and its register window mapped: other pipelines may share the
    /// engine. A stopped driver can be initialized again.
    pub fn stop(&mut self, registry: &mut PeripheralRegistry) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.pwm
            .cleanup(&mut self.clock, &mut self.control_block)?;
        self.clock.cleanup()?;
        registry.release(self.kind);
        self.initialized = false;
        self.previous_render = None;
        self.minimum_interval = Duration::ZERO;
        for channel in self.channels.iter().flatten() {
            self.gpio.set_function(channel.pin, PinFunction::Output)?;
            self.gpio.write_level(channel.pin, false)?;
        }
        debug!("pipeline stopped");
        Ok(())
    }

    fn reject_if_initialized(&self) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }
        Ok(())
    }
}
