pub mod bme688;
pub mod i2cio;
