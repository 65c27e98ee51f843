use std::time::Duration;

use derive_more::{Display, Error};

/// Result type used throughout this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors surfaced by the signal-generation pipeline.
///
/// Configuration errors are detected before any register is touched, so a
/// rejected configuration leaves the hardware untouched. Nothing in this
/// crate retries; every failure goes to the caller.
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum Error {
    /// The physical memory mapping service refused or failed a mapping.
    #[display("memory mapping failed: {_0}")]
    Mapping(#[error(not(source))] String),

    /// The GPIO service could not switch a pin's function.
    #[display("gpio operation failed: {_0}")]
    Gpio(#[error(not(source))] String),

    /// Only the PWM driver kind is implemented.
    #[display("driver kind is not supported; only PWM is implemented")]
    DriverNotSupported,

    /// Another configuration already owns this peripheral type.
    #[display("a driver for this peripheral type is already active")]
    DriverAlreadyActive,

    /// The setting cannot change while the configuration is initialized.
    #[display("configuration is already initialized; stop it first")]
    AlreadyInitialized,

    /// The operation needs an initialized configuration.
    #[display("configuration is not initialized")]
    NotInitialized,

    /// No strip was registered on any channel.
    #[display("no active channel; register at least one strip")]
    NoActiveChannel,

    /// Output frequency must be 400 kHz or 800 kHz.
    #[display("invalid output frequency {_0} Hz; expected 400000 or 800000")]
    InvalidFrequency(#[error(not(source))] u32),

    /// Strip index beyond the two PWM sub-channels.
    #[display("strip index {index} out of range; PWM provides {limit} channels")]
    StripIndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// Number of channels the peripheral provides.
        limit: usize,
    },

    /// DMA channel index beyond what the platform provides.
    #[display("DMA channel {channel} out of range; platform has {limit} channels")]
    DmaChannelOutOfRange {
        /// The rejected channel number.
        channel: u32,
        /// Number of usable DMA channels.
        limit: u32,
    },

    /// The requested pin has no PWM alternate function on that sub-channel.
    #[display("pin {pin} does not carry PWM sub-channel {channel}")]
    PinNotSupported {
        /// The rejected GPIO number.
        pin: u32,
        /// The PWM sub-channel the pin was requested for.
        channel: usize,
    },

    /// The PWM clock never reported the requested busy state.
    #[display("PWM clock not ready within {timeout:?}")]
    ClockTimeout {
        /// How long the controller polled before giving up.
        timeout: Duration,
    },
}
