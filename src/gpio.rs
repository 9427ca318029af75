use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn inverted(self) -> Self {
        match self {
            PinLevel::Low => PinLevel::High,
            PinLevel::High => PinLevel::Low,
        }
    }
}

/// Pins are only ever driven as outputs by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalState {
    High,
    Low,
    Unknown,
}

impl From<PinLevel> for LogicalState {
    fn from(level: PinLevel) -> Self {
        match level {
            PinLevel::High => LogicalState::High,
            PinLevel::Low => LogicalState::Low,
        }
    }
}

/// Allow-list of BCM pin numbers the controller accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidPinSet(BTreeSet<u32>);

impl ValidPinSet {
    pub fn new<I: IntoIterator<Item = u32>>(pins: I) -> Self {
        Self(pins.into_iter().collect())
    }

    /// Accepts any integer; anything that is not a listed BCM number is invalid.
    pub fn is_valid(&self, pin: i64) -> bool {
        u32::try_from(pin).is_ok_and(|pin| self.0.contains(&pin))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl Default for ValidPinSet {
    /// BCM 2..=27, the user GPIOs on the 40-pin header. 0 and 1 are the HAT EEPROM bus.
    fn default() -> Self {
        Self::new(2..=27)
    }
}

/// Pin-level hardware access. Implementations are called with the controller
/// lock held, so they never see two calls at once.
pub trait GpioDriver: Send {
    fn name(&self) -> &'static str;
    fn setup(&mut self, pin: u32, mode: PinMode) -> Result<(), AppError>;
    fn write(&mut self, pin: u32, level: PinLevel) -> Result<(), AppError>;
    /// Last commanded level; output lines cannot be sampled.
    fn read(&self, pin: u32) -> Result<PinLevel, AppError>;
    fn cleanup(&mut self) -> Result<(), AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum SetupOutcome {
    Configured,
    Rejected { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinSetupResult {
    pub pin: i64,
    #[serde(flatten)]
    pub outcome: SetupOutcome,
}

impl PinSetupResult {
    pub fn is_configured(&self) -> bool {
        self.outcome == SetupOutcome::Configured
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerInfo {
    pub driver: &'static str,
    pub valid_pins: Vec<u32>,
    pub configured_pins: Vec<u32>,
    pub total_configured: usize,
    pub pins: BTreeMap<u32, LogicalState>,
    /// Whether the driver's last commanded level agrees with the registry for every pin.
    pub in_sync: bool,
}

struct ControllerState {
    driver: Box<dyn GpioDriver>,
    registry: FxHashMap<u32, PinLevel>, // configured pins only
}

pub struct GpioController {
    valid_pins: ValidPinSet,
    driver_name: &'static str,
    state: Mutex<ControllerState>,
}

impl GpioController {
    pub fn new(valid_pins: ValidPinSet, driver: Box<dyn GpioDriver>) -> Self {
        let driver_name = driver.name();
        info!(
            "GPIO controller using {driver_name} driver, {} usable pins",
            valid_pins.len()
        );

        Self {
            valid_pins,
            driver_name,
            state: Mutex::new(ControllerState {
                driver,
                registry: FxHashMap::default(),
            }),
        }
    }

    pub fn is_valid(&self, pin: i64) -> bool {
        self.valid_pins.is_valid(pin)
    }

    /// Maps a requested pin onto the BCM number used by the registry and driver.
    fn validate(&self, pin: i64) -> Result<u32, AppError> {
        match u32::try_from(pin) {
            Ok(bcm) if self.valid_pins.is_valid(pin) => Ok(bcm),
            _ => {
                warn!("Rejected pin {pin}: not in the valid pin set");
                Err(AppError::InvalidPin(pin))
            }
        }
    }

    pub fn setup_pins(&self, pins: &[i64]) -> Vec<PinSetupResult> {
        let mut seen = BTreeSet::new();
        let mut results = Vec::with_capacity(pins.len());
        let mut state = self.state.lock();

        for &pin in pins {
            if !seen.insert(pin) {
                continue;
            }

            let outcome = match self.validate(pin) {
                Err(e) => SetupOutcome::Rejected {
                    reason: e.to_string(),
                },
                Ok(bcm) => match state.driver.setup(bcm, PinMode::Output) {
                    Ok(()) => {
                        state.registry.insert(bcm, PinLevel::Low);
                        info!("Pin {pin} configured as output, initial state LOW");
                        SetupOutcome::Configured
                    }
                    Err(e) => {
                        warn!("Failed to configure pin {pin}: {e}");
                        SetupOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                },
            };
            results.push(PinSetupResult { pin, outcome });
        }

        results
    }

    pub fn turn_on(&self, pin: i64) -> Result<PinLevel, AppError> {
        self.write_level(pin, PinLevel::High)
    }

    pub fn turn_off(&self, pin: i64) -> Result<PinLevel, AppError> {
        self.write_level(pin, PinLevel::Low)
    }

    fn write_level(&self, pin: i64, level: PinLevel) -> Result<PinLevel, AppError> {
        let pin = self.validate(pin)?;

        let mut state = self.state.lock();
        if !state.registry.contains_key(&pin) {
            return Err(AppError::NotConfigured(pin));
        }
        Self::apply(&mut state, pin, level)
    }

    fn apply(state: &mut ControllerState, pin: u32, level: PinLevel) -> Result<PinLevel, AppError> {
        state.driver.write(pin, level)?;
        if let Some(current) = state.registry.get_mut(&pin) {
            *current = level;
        }
        debug!("Pin {pin} set {level:?}");
        Ok(level)
    }

    pub fn toggle(&self, pin: i64) -> Result<PinLevel, AppError> {
        let pin = self.validate(pin)?;

        let mut state = self.state.lock();
        let current = state
            .registry
            .get(&pin)
            .copied()
            .ok_or(AppError::NotConfigured(pin))?;
        Self::apply(&mut state, pin, current.inverted())
    }

    pub fn status(&self, pin: i64) -> Result<PinLevel, AppError> {
        let pin = self.validate(pin)?;

        self.state
            .lock()
            .registry
            .get(&pin)
            .copied()
            .ok_or(AppError::NotConfigured(pin))
    }

    pub fn status_all(&self) -> BTreeMap<u32, PinLevel> {
        let state = self.state.lock();
        state
            .registry
            .iter()
            .map(|(pin, level)| (*pin, *level))
            .collect()
    }

    pub fn turn_all_off(&self) -> Result<BTreeMap<u32, PinLevel>, AppError> {
        let mut state = self.state.lock();
        let mut pins: Vec<u32> = state.registry.keys().copied().collect();
        pins.sort_unstable();

        let mut failed = Vec::new();
        for pin in pins {
            if let Err(e) = Self::apply(&mut state, pin, PinLevel::Low) {
                warn!("Failed to turn off pin {pin}: {e}");
                failed.push(pin);
            }
        }

        if !failed.is_empty() {
            return Err(AppError::Hardware(format!(
                "failed to turn off pins {failed:?}"
            )));
        }
        info!("All configured pins turned off");

        Ok(state
            .registry
            .iter()
            .map(|(pin, level)| (*pin, *level))
            .collect())
    }

    pub fn cleanup(&self) -> Result<(), AppError> {
        let mut state = self.state.lock();
        let state = &mut *state;

        for (pin, level) in state.registry.iter_mut() {
            match state.driver.write(*pin, PinLevel::Low) {
                Ok(()) => *level = PinLevel::Low,
                Err(e) => warn!("Could not drive pin {pin} low before cleanup: {e}"),
            }
        }
        state.driver.cleanup()?;

        let released = state.registry.len();
        state.registry.clear();
        info!("GPIO cleanup completed, {released} pins released");
        Ok(())
    }

    pub async fn pulse(&self, pin: i64, duration: Duration) -> Result<PinLevel, AppError> {
        self.turn_on(pin)?;
        tokio::time::sleep(duration).await;
        self.turn_off(pin)
    }

    pub async fn blink(
        &self,
        pin: i64,
        times: u32,
        interval: Duration,
    ) -> Result<PinLevel, AppError> {
        let mut level = self.status(pin)?;
        for _ in 0..times {
            self.turn_on(pin)?;
            tokio::time::sleep(interval).await;
            level = self.turn_off(pin)?;
            tokio::time::sleep(interval).await;
        }
        Ok(level)
    }

    pub fn info(&self) -> ControllerInfo {
        let state = self.state.lock();

        let mut configured_pins: Vec<u32> = state.registry.keys().copied().collect();
        configured_pins.sort_unstable();

        let in_sync = state
            .registry
            .iter()
            .all(|(pin, level)| matches!(state.driver.read(*pin), Ok(read) if read == *level));

        let pins = self
            .valid_pins
            .iter()
            .map(|pin| {
                let logical = state
                    .registry
                    .get(&pin)
                    .map(|level| LogicalState::from(*level))
                    .unwrap_or(LogicalState::Unknown);
                (pin, logical)
            })
            .collect();

        ControllerInfo {
            driver: self.driver_name,
            valid_pins: self.valid_pins.iter().collect(),
            total_configured: configured_pins.len(),
            configured_pins,
            pins,
            in_sync,
        }
    }
}
