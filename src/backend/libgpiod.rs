use log::{debug, warn};
use std::path::PathBuf;

use libgpiod::{chip::Chip, line, request};
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::gpio::{GpioDriver, PinLevel, PinMode};

/// GPIO character device backend. BCM numbers map 1:1 onto line offsets of
/// the configured chip.
pub struct LibgpiodDriver {
    chip: String,
    lines: FxHashMap<u32, LineHandle>, // keyed by BCM pin
}

struct LineHandle {
    request: request::Request,
    level: PinLevel, // last commanded
}

impl LibgpiodDriver {
    /// Opens the chip once to make sure the character device is usable.
    pub fn new(chip: &str) -> Result<Self, AppError> {
        Self::open_chip(chip)?;

        Ok(Self {
            chip: chip.to_string(),
            lines: FxHashMap::default(),
        })
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| AppError::Hardware(format!("open chip {path}: {e}")))
    }

    fn request_lines(chip: &Chip, line_cfg: &line::Config) -> Result<request::Request, AppError> {
        let mut req_cfg = request::Config::new()
            .map_err(|e| AppError::Hardware(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| AppError::Hardware(format!("request consumer: {e}")))?;
        chip.request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| AppError::Hardware(format!("request lines: {e}")))
    }

    fn output_settings(level: PinLevel) -> Result<line::Settings, AppError> {
        let mut ls = line::Settings::new()
            .map_err(|e| AppError::Hardware(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Output)
            .map_err(|e| AppError::Hardware(format!("set direction: {e}")))?;
        ls.set_output_value(to_value(level))
            .map_err(|e| AppError::Hardware(format!("set output value: {e}")))?;
        Ok(ls)
    }

    fn input_settings() -> Result<line::Settings, AppError> {
        let mut ls = line::Settings::new()
            .map_err(|e| AppError::Hardware(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Input)
            .map_err(|e| AppError::Hardware(format!("set direction: {e}")))?;
        ls.set_bias(None)
            .map_err(|e| AppError::Hardware(format!("set bias: {e}")))?;
        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, AppError> {
        let mut cfg =
            line::Config::new().map_err(|e| AppError::Hardware(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| AppError::Hardware(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }

    fn release(pin: u32, mut handle: LineHandle) -> Result<(), AppError> {
        let line_cfg = Self::make_line_config(pin, Self::input_settings()?)?;
        handle
            .request
            .reconfigure_lines(&line_cfg)
            .map_err(|e| AppError::Hardware(format!("reconfigure lines: {e}")))?;
        Ok(())
    }
}

fn to_value(level: PinLevel) -> line::Value {
    match level {
        PinLevel::Low => line::Value::InActive,
        PinLevel::High => line::Value::Active,
    }
}

impl GpioDriver for LibgpiodDriver {
    fn name(&self) -> &'static str {
        "libgpiod"
    }

    fn setup(&mut self, pin: u32, mode: PinMode) -> Result<(), AppError> {
        let settings = match mode {
            PinMode::Output => Self::output_settings(PinLevel::Low)?,
        };
        let line_cfg = Self::make_line_config(pin, settings)?;

        match self.lines.get_mut(&pin) {
            Some(handle) => {
                handle
                    .request
                    .reconfigure_lines(&line_cfg)
                    .map_err(|e| AppError::Hardware(format!("reconfigure lines: {e}")))?;
                handle.level = PinLevel::Low;
            }
            None => {
                let chip = Self::open_chip(&self.chip)?;
                let request = Self::request_lines(&chip, &line_cfg)?;
                self.lines.insert(
                    pin,
                    LineHandle {
                        request,
                        level: PinLevel::Low,
                    },
                );
            }
        }

        debug!("libgpiod: line {pin} on {} requested as output", self.chip);
        Ok(())
    }

    fn write(&mut self, pin: u32, level: PinLevel) -> Result<(), AppError> {
        let handle = self
            .lines
            .get_mut(&pin)
            .ok_or_else(|| AppError::Hardware(format!("line {pin} not requested")))?;

        handle
            .request
            .set_value(pin, to_value(level))
            .map_err(|e| AppError::Hardware(format!("set value: {e}")))?;
        handle.level = level;
        Ok(())
    }

    fn read(&self, pin: u32) -> Result<PinLevel, AppError> {
        self.lines
            .get(&pin)
            .map(|handle| handle.level)
            .ok_or_else(|| AppError::Hardware(format!("line {pin} not requested")))
    }

    fn cleanup(&mut self) -> Result<(), AppError> {
        // dropping the request hands the line back to the kernel
        for (pin, handle) in self.lines.drain() {
            if let Err(e) = Self::release(pin, handle) {
                warn!("libgpiod: could not return line {pin} to input: {e}");
            }
        }
        Ok(())
    }
}

impl Drop for LibgpiodDriver {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("libgpiod: cleanup on drop failed: {e}");
        }
    }
}
