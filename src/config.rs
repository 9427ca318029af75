use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::gpio::ValidPinSet;

pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub unix_socket: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            path: "/api".to_string(),
            unix_socket: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    /// Probe the gpiochip and fall back to simulation when it is missing.
    #[default]
    Auto,
    Hardware,
    Simulation,
}

impl FromStr for DriverKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DriverKind::Auto),
            "hardware" => Ok(DriverKind::Hardware),
            "simulation" => Ok(DriverKind::Simulation),
            other => Err(AppError::Config(format!(
                "Unknown driver '{other}', expected auto, hardware or simulation"
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GpioConfig {
    pub driver: DriverKind,
    pub chip: String,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Auto,
            chip: DEFAULT_CHIP.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub gpio: GpioConfig,
    pub debug: bool,
    pub log_level: Option<String>,
    pub default_pins: Vec<u32>,
    pub valid_pins: ValidPinSet,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))
    }

    /// Defaults, then the optional JSON file, then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("API_HOST") {
            self.http.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.http.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid API_PORT '{port}'")))?;
        }
        if let Some(path) = lookup("API_PATH") {
            self.http.path = path;
        }
        if let Some(socket) = lookup("API_UNIX_SOCKET") {
            self.http.unix_socket = Some(socket).filter(|s| !s.is_empty());
        }
        if let Some(debug) = lookup("API_DEBUG") {
            self.debug = parse_flag(&debug)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = Some(level).filter(|s| !s.is_empty());
        }
        if let Some(pins) = lookup("DEFAULT_PINS") {
            self.default_pins = parse_pin_list(&pins)?;
        }
        if let Some(pins) = lookup("VALID_PINS") {
            let pins = ValidPinSet::new(parse_pin_list(&pins)?);
            if pins.is_empty() {
                return Err(AppError::Config("VALID_PINS must not be empty".into()));
            }
            self.valid_pins = pins;
        }
        if let Some(driver) = lookup("GPIO_DRIVER") {
            self.gpio.driver = driver.parse()?;
        }
        if let Some(chip) = lookup("GPIO_CHIP") {
            self.gpio.chip = chip;
        }
        Ok(())
    }

    pub fn log_filter(&self) -> String {
        match &self.log_level {
            Some(level) => level.clone(),
            None if self.debug => "debug".to_string(),
            None => "info".to_string(),
        }
    }
}

fn parse_flag(value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::Config(format!("Invalid boolean '{other}'"))),
    }
}

/// Parses a comma separated list such as `"17, 18,27"`; blank entries are skipped.
pub fn parse_pin_list(value: &str) -> Result<Vec<u32>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| AppError::Config(format!("Invalid pin number '{s}'")))
        })
        .collect()
}
