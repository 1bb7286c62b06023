//! H-bridge valve motor and photo-eye implementation using ESP32 LEDC PWM.
//!
//! The bridge is controlled via two PWM signals, one per half-bridge:
//! - Open: OPEN = duty, CLOSE = 0
//! - Close: OPEN = 0, CLOSE = duty
//! - Stop: Both = 0
//!
//! The photo-eye LED is only powered while the motor runs. The periodic
//! tick is not a peripheral here: the firmware runs it from a timer service
//! callback and checks [`Esp32Valve::tick_enabled`] on every period.

use crate::traits::{Direction, ValveHardware};
use esp_idf_hal::gpio::{Input, InputPin, Output, OutputPin, PinDriver};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::sys::EspError;

/// Valve motor and feedback sensor for ESP32.
///
/// Uses the LEDC peripheral for PWM generation at 20kHz with 8-bit
/// resolution, so controller duty values map one to one.
///
/// # Example
///
/// ```ignore
/// use rs_valve::hal::esp32::Esp32Valve;
/// use rs_valve::traits::{Direction, ValveHardware};
///
/// let peripherals = Peripherals::take()?;
/// let mut hw = Esp32Valve::new(
///     peripherals.pins.gpio2,
///     peripherals.pins.gpio3,
///     peripherals.ledc.timer0,
///     peripherals.ledc.channel0,
///     peripherals.ledc.channel1,
///     peripherals.pins.gpio4,
///     peripherals.pins.gpio5,
/// )?;
///
/// hw.set_bridge(Direction::Open)?;
/// hw.set_pwm(Some(200))?;
/// ```
pub struct Esp32Valve<'d, LED, EYE>
where
    LED: OutputPin,
    EYE: InputPin,
{
    /// Open-side PWM channel
    open_pwm: LedcDriver<'d>,
    /// Close-side PWM channel
    close_pwm: LedcDriver<'d>,
    /// Photo-eye LED supply
    eye_power: PinDriver<'d, LED, Output>,
    /// Photo-eye sensor input
    eye_sense: PinDriver<'d, EYE, Input>,
    bridge: Direction,
    duty: Option<u8>,
    eye_enabled: bool,
    tick_enabled: bool,
}

impl<'d, LED, EYE> Esp32Valve<'d, LED, EYE>
where
    LED: OutputPin,
    EYE: InputPin,
{
    /// PWM frequency in Hz (20kHz is above audible range)
    const PWM_FREQ_HZ: u32 = 20_000;

    /// PWM resolution (8-bit = 256 steps)
    const PWM_RESOLUTION: Resolution = Resolution::Bits8;

    /// Creates the valve driver with the motor stopped and the eye off.
    ///
    /// # Errors
    ///
    /// Returns an error if PWM or GPIO initialization fails.
    #[allow(clippy::too_many_arguments)]
    pub fn new<T, TI, OC, OCI, CC, CCI, OP, OPI, CP, CPI>(
        open_pin: OP,
        close_pin: CP,
        timer: T,
        open_channel: OC,
        close_channel: CC,
        eye_power_pin: impl Peripheral<P = LED> + 'd,
        eye_sense_pin: impl Peripheral<P = EYE> + 'd,
    ) -> Result<Self, EspError>
    where
        TI: esp_idf_hal::ledc::LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
        OCI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        OC: Peripheral<P = OCI> + 'd,
        CCI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        CC: Peripheral<P = CCI> + 'd,
        OPI: OutputPin + 'd,
        OP: Peripheral<P = OPI> + 'd,
        CPI: OutputPin + 'd,
        CP: Peripheral<P = CPI> + 'd,
    {
        let timer_config = TimerConfig::default()
            .frequency(Self::PWM_FREQ_HZ.Hz())
            .resolution(Self::PWM_RESOLUTION);
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;

        let open_pwm = LedcDriver::new(open_channel, &timer_driver, open_pin)?;
        let close_pwm = LedcDriver::new(close_channel, &timer_driver, close_pin)?;

        let mut valve = Self {
            open_pwm,
            close_pwm,
            eye_power: PinDriver::output(eye_power_pin)?,
            eye_sense: PinDriver::input(eye_sense_pin)?,
            bridge: Direction::Stop,
            duty: None,
            eye_enabled: false,
            tick_enabled: false,
        };

        // Ensure motor starts stopped
        valve.apply_pwm()?;
        valve.eye_power.set_low()?;

        Ok(valve)
    }

    /// Applies the current bridge direction and duty to the PWM outputs.
    fn apply_pwm(&mut self) -> Result<(), EspError> {
        let duty = u32::from(self.duty.unwrap_or(0));

        match self.bridge {
            Direction::Open => {
                self.close_pwm.set_duty(0)?;
                self.open_pwm.set_duty(duty)?;
            }
            Direction::Close => {
                self.open_pwm.set_duty(0)?;
                self.close_pwm.set_duty(duty)?;
            }
            Direction::Stop => {
                self.open_pwm.set_duty(0)?;
                self.close_pwm.set_duty(0)?;
            }
        }

        Ok(())
    }

    /// Current photo-eye level. Always low while the eye is off.
    #[inline]
    pub fn eye_level(&self) -> bool {
        self.eye_enabled && self.eye_sense.is_high()
    }

    /// Returns true if the eye is powered and its samples should be used.
    #[inline]
    pub fn eye_enabled(&self) -> bool {
        self.eye_enabled
    }

    /// Returns true while the controller wants timer ticks.
    #[inline]
    pub fn tick_enabled(&self) -> bool {
        self.tick_enabled
    }
}

impl<LED, EYE> ValveHardware for Esp32Valve<'_, LED, EYE>
where
    LED: OutputPin,
    EYE: InputPin,
{
    type Error = EspError;

    fn set_bridge(&mut self, dir: Direction) -> Result<(), EspError> {
        self.bridge = dir;
        self.apply_pwm()
    }

    fn set_pwm(&mut self, duty: Option<u8>) -> Result<(), EspError> {
        self.duty = duty;
        self.apply_pwm()
    }

    fn set_eye_enabled(&mut self, enabled: bool) -> Result<(), EspError> {
        self.eye_enabled = enabled;
        if enabled {
            self.eye_power.set_high()
        } else {
            self.eye_power.set_low()
        }
    }

    fn set_tick_enabled(&mut self, enabled: bool) -> Result<(), EspError> {
        self.tick_enabled = enabled;
        Ok(())
    }

    fn fast_stop(&mut self) -> Result<(), EspError> {
        self.bridge = Direction::Stop;
        self.duty = None;
        self.open_pwm.set_duty(0)?;
        self.close_pwm.set_duty(0)
    }
}
