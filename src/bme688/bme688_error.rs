use std::fmt;
use thiserror::Error;

use crate::i2cio::I2cError;

// -- sentinel returned to compatibility call sites for a gas measurement that did not complete
pub const BME688_SENTINEL_GAS_INCOMPLETE: f64 = -2.0;
// -- sentinel returned to compatibility call sites for every other failure
pub const BME688_SENTINEL_FAILURE: f64 = -1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationDomain {
    Temperature,
    Pressure,
    Humidity,
    Gas,
}

impl fmt::Display for CalibrationDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Temperature => write!(f, "temperature"),
            Self::Pressure => write!(f, "pressure"),
            Self::Humidity => write!(f, "humidity"),
            Self::Gas => write!(f, "gas"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Bme688Error {
    #[error("BME688 is disconnected, expected chip id {expected:#04x}, found {found:?}")]
    Connection { expected: u8, found: Option<u8> },
    #[error("Failed to read {domain} calibration parameters: {source}")]
    CalibrationRead { domain: CalibrationDomain, source: I2cError },
    #[error("Invalid value {value} for {what}, use a value within the range")]
    InvalidArgument { what: &'static str, value: u32 },
    #[error("Failed to read from register {register:#04x}: {source}")]
    ReadFailure { register: u8, source: I2cError },
    #[error("Gas measurement incomplete (status {status:#04x}), temperature not reached or wait time too short")]
    GasMeasurementIncomplete { status: u8 },
    #[error("Heater target {target}°C exceeds the safe limit of {limit}°C, override required")]
    ThermalSafetyRejected { target: u16, limit: u16 },
    #[error("Heater target {target}°C exceeds the maximum limit of {limit}°C")]
    ThermalHardLimitExceeded { target: u16, limit: u16 },
    #[error("Pressure compensation divides by zero, calibration data is degenerate")]
    DivisionByZero,
    #[error("Bus error: {0}")]
    Bus(#[from] I2cError),
}

impl Bme688Error {
    pub fn sentinel(&self) -> f64 {
        match *self {
            Self::GasMeasurementIncomplete { .. } => BME688_SENTINEL_GAS_INCOMPLETE,
            _ => BME688_SENTINEL_FAILURE,
        }
    }
}

pub trait OrSentinel {
    fn or_sentinel(self) -> f64;
}

impl OrSentinel for Result<f64, Bme688Error> {
    fn or_sentinel(self) -> f64 {
        match self {
            Ok(val) => val,
            Err(err) => err.sentinel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_gas_measurement_has_its_own_sentinel() {
        let err = Bme688Error::GasMeasurementIncomplete { status: 0x10 };
        assert_eq!(err.sentinel(), -2.0);
        assert_eq!(Err::<f64, _>(err).or_sentinel(), -2.0);
    }

    #[test]
    fn rejections_map_to_negative_one() {
        let errs = [
            Bme688Error::InvalidArgument { what: "profile", value: 10 },
            Bme688Error::ThermalSafetyRejected { target: 450, limit: 425 },
            Bme688Error::ThermalHardLimitExceeded { target: 600, limit: 600 },
            Bme688Error::DivisionByZero,
        ];
        for err in errs {
            assert_eq!(Err::<f64, _>(err).or_sentinel(), -1.0);
        }
        assert_eq!(Ok::<f64, Bme688Error>(1234.5).or_sentinel(), 1234.5);
    }
}
