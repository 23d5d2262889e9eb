//! Minimal Linux sysfs GPIO access.
//!
//! Pins are exported on demand through `<root>/export` and then driven via
//! `<root>/gpio<N>/direction` and `<root>/gpio<N>/value`.

use crate::error::HardwareError;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// A single sysfs GPIO line
#[derive(Debug, Clone)]
pub struct GpioPin {
    number: u32,
    root: PathBuf,
    pin_dir: PathBuf,
}

impl GpioPin {
    pub fn new<P: AsRef<Path>>(root: P, number: u32) -> Self {
        let root = root.as_ref().to_path_buf();
        let pin_dir = root.join(format!("gpio{}", number));
        Self {
            number,
            root,
            pin_dir,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    fn device(&self) -> String {
        self.pin_dir.display().to_string()
    }

    /// Export the pin if needed and set its direction
    pub fn open(&self, direction: Direction) -> Result<(), HardwareError> {
        if !self.pin_dir.exists() {
            let export = self.root.join("export");
            debug!("Exporting GPIO {} via {}", self.number, export.display());
            fs::write(&export, self.number.to_string())
                .map_err(|e| HardwareError::from_io(export.display().to_string(), e))?;
        }

        let direction_path = self.pin_dir.join("direction");
        fs::write(&direction_path, direction.as_str())
            .map_err(|e| HardwareError::from_io(self.device(), e))?;

        info!("GPIO {} configured as {}", self.number, direction.as_str());
        Ok(())
    }

    /// Read the raw line level
    pub fn read(&self) -> Result<bool, HardwareError> {
        let raw = fs::read_to_string(self.pin_dir.join("value"))
            .map_err(|e| HardwareError::from_io(self.device(), e))?;

        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(HardwareError::InvalidValue {
                device: self.device(),
                value: other.to_string(),
            }),
        }
    }

    /// Drive the line level
    pub fn write(&self, high: bool) -> Result<(), HardwareError> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.pin_dir.join("value"))
            .map_err(|e| HardwareError::from_io(self.device(), e))?;

        file.seek(SeekFrom::Start(0))
            .map_err(|e| HardwareError::from_io(self.device(), e))?;
        file.write_all(if high { b"1" } else { b"0" })
            .map_err(|e| HardwareError::from_io(self.device(), e))?;
        file.flush()
            .map_err(|e| HardwareError::from_io(self.device(), e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_pin(root: &Path, number: u32, value: &str) -> GpioPin {
        let dir = root.join(format!("gpio{}", number));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), value).unwrap();
        fs::write(dir.join("direction"), "in").unwrap();
        GpioPin::new(root, number)
    }

    #[test]
    fn test_read_and_write_value() {
        let root = tempfile::tempdir().unwrap();
        let pin = fake_pin(root.path(), 18, "0\n");

        pin.open(Direction::Out).unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("gpio18/direction")).unwrap(),
            "out"
        );

        assert!(!pin.read().unwrap());
        pin.write(true).unwrap();
        assert!(pin.read().unwrap());
        pin.write(false).unwrap();
        assert!(!pin.read().unwrap());
    }

    #[test]
    fn test_missing_pin_is_reported_missing() {
        let root = tempfile::tempdir().unwrap();
        let pin = GpioPin::new(root.path(), 7);

        let err = pin.read().unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_garbage_value_rejected() {
        let root = tempfile::tempdir().unwrap();
        let pin = fake_pin(root.path(), 3, "x");

        assert!(matches!(
            pin.read(),
            Err(HardwareError::InvalidValue { .. })
        ));
    }
}
