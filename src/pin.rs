//! The consumed GPIO capability and the PWM pin tables.
//!
//! Pin map of alternate pin configuration for PWM:
//!
//! ```text
//! GPIO    PWM0   PWM1
//!  12     alt0
//!  13            alt0
//!  18     alt5
//!  19            alt5
//!  40     alt0
//!  41            alt0
//!  45            alt0
//! ```

use crate::Result;

/// GPIO pin function selectors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PinFunction {
    /// Plain output.
    Output,
    /// Alternate function 0.
    Alt0,
    /// Alternate function 5.
    Alt5,
}

/// Pin mode switching, implemented by the platform GPIO service.
pub trait GpioController {
    /// Switch `pin` to `function`.
    fn set_function(&mut self, pin: u32, function: PinFunction) -> Result<()>;

    /// Drive `pin` high or low. Only meaningful after switching it to
    /// [`PinFunction::Output`].
    fn write_level(&mut self, pin: u32, high: bool) -> Result<()>;
}

const PWM0_PINS: &[(u32, PinFunction)] = &[
    (12, PinFunction::Alt0),
    (18, PinFunction::Alt5),
    (40, PinFunction::Alt0),
];

const PWM1_PINS: &[(u32, PinFunction)] = &[
    (13, PinFunction::Alt0),
    (19, PinFunction::Alt5),
    (41, PinFunction::Alt0),
    (45, PinFunction::Alt0),
];

/// Look up the alternate function that routes PWM sub-channel `channel` onto
/// `pin`, or `None` if that pin cannot carry the sub-channel.
#[must_use]
pub fn pwm_alt_function(channel: usize, pin: u32) -> Option<PinFunction> {
    let table = match channel {
        0 => PWM0_PINS,
        1 => PWM1_PINS,
        _ => return None,
    };
    table
        .iter()
        .find(|(candidate, _)| *candidate == pin)
        .map(|(_, function)| *function)
}
