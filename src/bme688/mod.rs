pub mod bme688_calib;
pub mod bme688_comp;
pub mod bme688_core;
pub mod bme688_enums;
pub mod bme688_error;
pub mod bme688_heater;

pub use bme688_calib::{CalibrationLoad, CalibrationSet};
pub use bme688_comp::IntermediateState;
pub use bme688_core::BME688;
pub use bme688_enums::*;
pub use bme688_error::{Bme688Error, CalibrationDomain, OrSentinel};
pub use bme688_heater::{GasProfile, GasState, HeaterController};
