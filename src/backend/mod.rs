#[cfg(feature = "hardware-gpio")]
pub mod libgpiod;
pub mod simulation;

use log::{info, warn};

#[cfg(feature = "hardware-gpio")]
pub use self::libgpiod::LibgpiodDriver;
pub use self::simulation::SimulationDriver;

use crate::config::{DriverKind, GpioConfig};
use crate::error::AppError;
use crate::gpio::GpioDriver;

/// Chooses the driver once at startup. Only `auto` may fall back to simulation.
pub fn select_driver(cfg: &GpioConfig) -> Result<Box<dyn GpioDriver>, AppError> {
    match cfg.driver {
        DriverKind::Simulation => {
            info!("Using simulation GPIO driver");
            Ok(Box::new(SimulationDriver::default()))
        }
        DriverKind::Hardware => hardware_driver(&cfg.chip),
        DriverKind::Auto => match hardware_driver(&cfg.chip) {
            Ok(driver) => Ok(driver),
            Err(e) => {
                warn!("GPIO hardware unavailable ({e}), simulation mode enabled");
                Ok(Box::new(SimulationDriver::default()))
            }
        },
    }
}

#[cfg(feature = "hardware-gpio")]
fn hardware_driver(chip: &str) -> Result<Box<dyn GpioDriver>, AppError> {
    let driver = LibgpiodDriver::new(chip)?;
    info!("Using libgpiod GPIO driver on {chip}");
    Ok(Box::new(driver))
}

#[cfg(not(feature = "hardware-gpio"))]
fn hardware_driver(_chip: &str) -> Result<Box<dyn GpioDriver>, AppError> {
    Err(AppError::Config(
        "built without the hardware-gpio feature".into(),
    ))
}
