//! PWM reference clock controller.
//!
//! The serializer's bit rate is the oscillator divided down to three times
//! the strip's data rate (one protocol bit becomes a 3-bit symbol). Starting
//! and stopping the clock are busy-waits on the control register's busy
//! flag; both are bounded by a caller-supplied timeout so absent or faulty
//! hardware surfaces an error instead of hanging.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::encoder::BITS_PER_OUTPUT_BIT;
use crate::memmap::{Hardware, MemoryMapper, RegisterWindow};
use crate::{Error, Result};

/// Bus offset of the clock manager register block.
pub const CLOCK_BUS_OFFSET: u32 = 0x0010_1000;

const CLK_PWM_CTL: u32 = 0xa0;
const CLK_PWM_DIV: u32 = 0xa4;

/// Password field required by the clock manager registers.
const CLK_PASSWD: u32 = 0x5a00_0000;

const CLK_CTL_SRC_OSC: u32 = 1 << 0;
const CLK_CTL_ENAB: u32 = 1 << 4;
const CLK_CTL_KILL: u32 = 1 << 5;
const CLK_CTL_BUSY: u32 = 1 << 7;

fn clk_div_divi(value: u32) -> u32 {
    (value & 0xfff) << 12
}

const SETTLE: Duration = Duration::from_micros(10);
const POLL: Duration = Duration::from_micros(1);

/// Driver for the PWM branch of the clock manager.
pub struct ClockController<W> {
    window: Option<W>,
    timeout: Duration,
}

impl<W: RegisterWindow> ClockController<W> {
    /// Create an unmapped controller. `timeout` bounds the start/stop
    /// busy-waits.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            window: None,
            timeout,
        }
    }

    /// Replace the busy-wait bound.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Map the clock register window. A second call is a no-op.
    pub fn initialize<M>(&mut self, mapper: &M) -> Result<()>
    where
        M: MemoryMapper<Window = W>,
    {
        if self.window.is_some() {
            trace!("clock already mapped, skipping");
            return Ok(());
        }
        self.window = Some(mapper.map_peripheral(CLOCK_BUS_OFFSET, mapper.page_size())?);
        debug!("clock register window mapped");
        Ok(())
    }

    /// Configure and start the clock for an LED data rate of `frequency_hz`.
    ///
    /// The divisor is `oscillator / (3 * frequency)`: the serializer emits
    /// three clock periods per protocol bit. The clock is stopped first;
    /// after enabling, this waits for the busy flag with the configured
    /// timeout.
    pub fn setup_for_frequency(&mut self, hardware: &Hardware, frequency_hz: u32) -> Result<()> {
        self.stop()?;
        let window = self.window.as_mut().ok_or(Error::NotInitialized)?;
        let divisor = hardware.oscillator_hz / (BITS_PER_OUTPUT_BIT * frequency_hz);
        window.write(CLK_PWM_DIV, CLK_PASSWD | clk_div_divi(divisor));
        window.write(CLK_PWM_CTL, CLK_PASSWD | CLK_CTL_SRC_OSC);
        window.write(CLK_PWM_CTL, CLK_PASSWD | CLK_CTL_SRC_OSC | CLK_CTL_ENAB);
        thread::sleep(SETTLE);
        debug!(divisor, "waiting for PWM clock to start");
        self.wait_for_busy(true)?;
        debug!("PWM clock running");
        Ok(())
    }

    /// Kill the clock and wait for the busy flag to clear. No-op while
    /// unmapped.
    pub fn stop(&mut self) -> Result<()> {
        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };
        window.write(CLK_PWM_CTL, CLK_PASSWD | CLK_CTL_KILL);
        thread::sleep(SETTLE);
        debug!("waiting for PWM clock to stop");
        self.wait_for_busy(false)?;
        debug!("PWM clock stopped");
        Ok(())
    }

    /// Unmap the register window. A later [`initialize`](Self::initialize)
    /// re-creates it.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(mut window) = self.window.take() {
            window.unmap()?;
        }
        Ok(())
    }

    fn wait_for_busy(&self, expect_set: bool) -> Result<()> {
        let window = self.window.as_ref().ok_or(Error::NotInitialized)?;
        let started = Instant::now();
        loop {
            let busy = window.read(CLK_PWM_CTL) & CLK_CTL_BUSY != 0;
            if busy == expect_set {
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(Error::ClockTimeout {
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL);
        }
    }
}
