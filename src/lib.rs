pub mod backend;
pub mod config;
pub mod error;
pub mod gpio;
pub mod routes;

pub use config::{AppConfig, DriverKind, GpioConfig, HttpConfig};
pub use error::AppError;
pub use gpio::{
    ControllerInfo, GpioController, GpioDriver, LogicalState, PinLevel, PinMode, PinSetupResult,
    SetupOutcome, ValidPinSet,
};
pub use routes::{AppState, api_scope};

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodDriver;
pub use backend::{SimulationDriver, select_driver};
