use log::debug;
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::gpio::{GpioDriver, PinLevel, PinMode};

/// In-memory stand-in for the GPIO character device, used off-hardware.
#[derive(Default)]
pub struct SimulationDriver {
    pins: FxHashMap<u32, PinLevel>, // keyed by BCM pin
}

impl GpioDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn setup(&mut self, pin: u32, mode: PinMode) -> Result<(), AppError> {
        self.pins.insert(pin, PinLevel::Low);
        debug!("simulation: setup pin {pin} as {mode:?}");
        Ok(())
    }

    fn write(&mut self, pin: u32, level: PinLevel) -> Result<(), AppError> {
        let current = self
            .pins
            .get_mut(&pin)
            .ok_or_else(|| AppError::Hardware(format!("pin {pin} not set up")))?;
        *current = level;
        debug!("simulation: pin {pin} = {level:?}");
        Ok(())
    }

    fn read(&self, pin: u32) -> Result<PinLevel, AppError> {
        self.pins
            .get(&pin)
            .copied()
            .ok_or_else(|| AppError::Hardware(format!("pin {pin} not set up")))
    }

    fn cleanup(&mut self) -> Result<(), AppError> {
        self.pins.clear();
        debug!("simulation: cleanup completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_starts_low_and_write_is_read_back() {
        let mut driver = SimulationDriver::default();
        driver.setup(18, PinMode::Output).unwrap();
        assert_eq!(driver.read(18).unwrap(), PinLevel::Low);

        driver.write(18, PinLevel::High).unwrap();
        assert_eq!(driver.read(18).unwrap(), PinLevel::High);

        driver.setup(18, PinMode::Output).unwrap();
        assert_eq!(driver.read(18).unwrap(), PinLevel::Low);
    }

    #[test]
    fn write_before_setup_fails() {
        let mut driver = SimulationDriver::default();
        assert!(matches!(
            driver.write(4, PinLevel::High),
            Err(AppError::Hardware(_))
        ));
    }

    #[test]
    fn cleanup_releases_every_pin() {
        let mut driver = SimulationDriver::default();
        driver.setup(4, PinMode::Output).unwrap();
        driver.setup(5, PinMode::Output).unwrap();
        driver.cleanup().unwrap();

        assert!(driver.read(4).is_err());
        assert!(driver.read(5).is_err());
        driver.cleanup().unwrap();
    }
}
