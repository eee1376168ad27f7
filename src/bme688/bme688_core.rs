use log::{debug, error, info, warn};
use std::path::Path;

use crate::i2cio::{self, Delay, Endian, LinuxI2c, RegisterTransport, ThreadDelay};

use super::bme688_calib::CalibrationSet;
use super::bme688_comp::{self, IntermediateState};
use super::bme688_enums::*;
use super::bme688_error::Bme688Error;
use super::bme688_heater::{self, GasState, HeaterController};

const BME688_CHIP_ID: u8 = 0x61;

// -- control and data registers
const BME688_REG_CHIP_ID: u8 = 0xd0;
const BME688_REG_RESET: u8 = 0xe0;
const BME688_REG_CTRL_HUM: u8 = 0x72;
const BME688_REG_CTRL_MEAS: u8 = 0x74;
const BME688_REG_CONFIG: u8 = 0x75;
const BME688_REG_PRESS_RAW: u8 = 0x1f;
const BME688_REG_TEMP_RAW: u8 = 0x22;
const BME688_REG_HUM_RAW: u8 = 0x25;

// -- bit widths of the raw data registers
const BME688_TEMP_RAW_BITS: u8 = 20;
const BME688_PRESS_RAW_BITS: u8 = 20;
const BME688_HUM_RAW_BITS: u8 = 16;

// -- other values
const BME688_COMMAND_SOFT_RESET: u8 = 0xb6;
const BME688_STARTUP_DELAY_MS: u32 = 2;
const BME688_SETTLE_DELAY_MS: u32 = 10;
const BME688_CONFIG_IIR_FILTER_SHL: u8 = 2;

/// Driver for one BME688 on a register transport `T` with time source `D`.
///
/// Not synchronised: share it between threads only behind an external lock.
pub struct BME688<T: RegisterTransport, D: Delay> {
    // -- register transport
    io: T,
    // -- blocking delays
    delay: D,
    // -- chip id, 0 until connected
    chip_id: u8,
    // -- oversampling, mode and safety settings
    config: OperatingConfig,
    // -- calibration params, populated by begin
    calib: CalibrationSet,
    // -- fine terms of the current measuring cycle
    state: IntermediateState,
    gas_state: GasState,
}

impl BME688<LinuxI2c, ThreadDelay> {

    pub fn open(i2c_bus_path: &Path, device_addr: Bme688DeviceAddress) -> Result<Self, Bme688Error> {
        // -- get the bus and bind the device address
        let io = LinuxI2c::open(i2c_bus_path, device_addr.value())?;
        Ok(BME688::new(io, ThreadDelay))
    }
}

impl<T: RegisterTransport, D: Delay> BME688<T, D> {

    pub fn new(io: T, delay: D) -> Self {
        BME688 {
            io,
            delay,
            chip_id: 0,
            config: OperatingConfig::default(),
            calib: CalibrationSet::default(),
            state: IntermediateState::default(),
            gas_state: GasState::Idle,
        }
    }

    pub fn release(self) -> (T, D) {
        (self.io, self.delay)
    }

    pub fn get_chip_id(&self) -> u8 {
        self.chip_id
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calib
    }

    pub fn intermediate_state(&self) -> &IntermediateState {
        &self.state
    }

    pub fn config(&self) -> &OperatingConfig {
        &self.config
    }

    pub fn gas_state(&self) -> GasState {
        self.gas_state
    }

    pub fn show_logs(&mut self, show: bool) {
        self.config.show_logs = show;
    }

    fn print_log(&self, err: &Bme688Error) {
        if self.config.show_logs {
            error!("{err}");
        }
    }

    // -- logs the failure of an operation when enabled and passes the result on
    fn logged<R>(&self, result: Result<R, Bme688Error>) -> Result<R, Bme688Error> {
        if let Err(err) = &result {
            self.print_log(err);
        }
        result
    }

    // -- initializes with the current configuration. Logs and returns false on failure
    pub fn begin(&mut self) -> bool {
        let result = self.try_begin();
        self.logged(result).is_ok()
    }

    pub fn begin_with_mode(&mut self, mode: u8) -> bool {
        let result = Bme688OperatingMode::try_from(mode).and_then(|mode| {
            self.config.mode = mode;
            self.config.temperature_osr = Bme688OverSampling::Oversampling1x;
            self.config.pressure_osr = Bme688OverSampling::Oversampling1x;
            self.config.humidity_osr = Bme688OverSampling::Oversampling1x;
            self.try_begin()
        });
        self.logged(result).is_ok()
    }

    pub fn begin_with_mode_and_oversampling(&mut self, mode: u8, osr: u8) -> bool {
        let result = Bme688OperatingMode::try_from(mode)
            .and_then(|mode| Ok((mode, Bme688OverSampling::try_from(osr)?)))
            .and_then(|(mode, osr)| {
                self.config.mode = mode;
                self.config.temperature_osr = osr;
                self.config.pressure_osr = osr;
                self.config.humidity_osr = osr;
                self.try_begin()
            });
        self.logged(result).is_ok()
    }

    /// Checks the chip, then writes the configuration, loads calibration and seeds the
    /// heater profiles. Only a missing or foreign chip fails; every later step warns and continues.
    pub fn try_begin(&mut self) -> Result<(), Bme688Error> {
        self.check_connection()?;
        info!("Found BME688 with chip id {:#04x}", self.chip_id);
        if let Err(err) = self.write_config() {
            self.print_log(&err);
        }
        // -- get calibration data, best effort
        let load = CalibrationSet::load(&mut self.io);
        if self.config.show_logs {
            for (domain, err) in load.failures.iter() {
                warn!("Continuing with incomplete {domain} calibration: {err}");
            }
        }
        self.calib = load.calib;
        // -- profiles use the stored fine temperature when the fresh read fails
        if self.read_temperature().is_err() {
            debug!("Seeding heater profiles with t_fine {}", self.state.t_fine);
        }
        let result = self.heater().program_profiles();
        if let Err(err) = result {
            self.print_log(&err);
        }
        self.check_connection()
    }

    fn write_config(&mut self) -> Result<(), Bme688Error> {
        // -- oversampling for humidity, then temperature/pressure with the power mode
        self.io.write_register(BME688_REG_CTRL_HUM, self.config.humidity_osr.value())?;
        debug!("Setting ctrl meas to {:#010b}", self.config.ctrl_meas());
        self.io.write_register(BME688_REG_CTRL_MEAS, self.config.ctrl_meas())?;
        // -- filter coefficient goes into bits 2..4 of config, so Coef15 (0x04) is written as 0x10
        // -- and not as the unshifted 0x04
        debug!("Setting IIR filter {}", self.config.iir_filter);
        self.io.write_register(BME688_REG_CONFIG, self.config.iir_filter.value() << BME688_CONFIG_IIR_FILTER_SHL)?;
        Ok(())
    }

    fn check_connection(&mut self) -> Result<(), Bme688Error> {
        let found = if self.io.probe() {
            self.io.read_byte(BME688_REG_CHIP_ID).ok()
        } else {
            None
        };
        match found {
            Some(BME688_CHIP_ID) => {
                self.chip_id = BME688_CHIP_ID;
                Ok(())
            }
            _ => Err(Bme688Error::Connection { expected: BME688_CHIP_ID, found }),
        }
    }

    // -- true only when the device answers the probe and reports chip id 0x61
    pub fn is_connected(&mut self) -> bool {
        self.check_connection().is_ok()
    }

    pub fn soft_reset(&mut self) -> Result<(), Bme688Error> {
        // -- initiate soft reset
        debug!("Initiating soft reset");
        self.io.write_register(BME688_REG_RESET, BME688_COMMAND_SOFT_RESET)?;
        // -- wait for the device to startup
        self.delay.delay_ms(BME688_STARTUP_DELAY_MS);
        Ok(())
    }

    pub fn set_temperature_oversampling(&mut self, osr: u8) -> Result<(), Bme688Error> {
        let result = self.config.set_temperature_oversampling(osr);
        self.logged(result)
    }

    pub fn set_pressure_oversampling(&mut self, osr: u8) -> Result<(), Bme688Error> {
        let result = self.config.set_pressure_oversampling(osr);
        self.logged(result)
    }

    pub fn set_humidity_oversampling(&mut self, osr: u8) -> Result<(), Bme688Error> {
        let result = self.config.set_humidity_oversampling(osr);
        self.logged(result)
    }

    pub fn set_iir_filter(&mut self, iir_filter: Bme688IirFilter) {
        self.config.iir_filter = iir_filter;
    }

    pub fn ignore_unsafe_temperature_warnings(&mut self, ignore: bool) {
        self.config.allow_high_temps = ignore;
        if self.config.show_logs {
            warn!("Heater temperatures above {}°C degrade the lifespan of the sensor", bme688_heater::BME688_HEAT_PLATE_MAX_TEMP);
        }
    }

    // -- writes the control word and waits for the conversion
    fn trigger_measurement(&mut self) -> Result<(), Bme688Error> {
        self.io.write_register(BME688_REG_CTRL_MEAS, self.config.ctrl_meas())?;
        self.delay.delay_ms(BME688_SETTLE_DELAY_MS);
        Ok(())
    }

    fn read_raw<R: i2cio::FromBits>(&mut self, register: u8, bits: u8) -> Result<R, Bme688Error> {
        i2cio::read_bits(&mut self.io, register, bits, Endian::Big)
            .map_err(|source| Bme688Error::ReadFailure { register, source })
    }

    /// Temperature in °C. Also refreshes the fine temperature used by the other readings.
    pub fn read_temperature(&mut self) -> Result<f64, Bme688Error> {
        let result = self.trigger_measurement()
            .and_then(|_| self.read_raw::<i32>(BME688_REG_TEMP_RAW, BME688_TEMP_RAW_BITS))
            .map(|temperature_raw| {
                debug!("Got raw temperature {temperature_raw}");
                bme688_comp::compensate_temperature(&self.calib, &mut self.state, temperature_raw)
            });
        self.logged(result)
    }

    pub fn read_pressure(&mut self) -> Result<f64, Bme688Error> {
        let result = self.trigger_measurement()
            .and_then(|_| self.read_raw::<i32>(BME688_REG_PRESS_RAW, BME688_PRESS_RAW_BITS))
            .and_then(|pressure_raw| {
                debug!("Got raw pressure {pressure_raw}");
                bme688_comp::compensate_pressure(&self.calib, &mut self.state, pressure_raw)
            });
        self.logged(result)
    }

    pub fn read_humidity(&mut self) -> Result<f64, Bme688Error> {
        let result = self.io.write_register(BME688_REG_CTRL_HUM, self.config.humidity_osr.value())
            .map_err(Bme688Error::from)
            .and_then(|_| self.trigger_measurement())
            .and_then(|_| self.read_raw::<u16>(BME688_REG_HUM_RAW, BME688_HUM_RAW_BITS))
            .map(|humidity_raw| {
                debug!("Got raw humidity {humidity_raw}");
                bme688_comp::compensate_humidity(&self.calib, &mut self.state, humidity_raw)
            });
        self.logged(result)
    }

    fn heater(&mut self) -> HeaterController<'_, T, D> {
        HeaterController {
            io: &mut self.io,
            delay: &mut self.delay,
            calib: &self.calib,
            state: &mut self.state,
            gas_state: &mut self.gas_state,
            mode: self.config.mode,
        }
    }

    // -- heats the plate to `temperature` °C in slot 0 and returns the gas resistance in ohms
    pub fn read_gas_for_temperature(&mut self, temperature: u16) -> Result<f64, Bme688Error> {
        let allow_high_temps = self.config.allow_high_temps;
        let result = self.heater().measure_at_temperature(temperature, allow_high_temps);
        self.logged(result)
    }

    // -- runs the pre-programmed heater profile `profile` (0..=9) and returns the gas resistance in ohms
    pub fn read_gas(&mut self, profile: u8) -> Result<f64, Bme688Error> {
        let result = self.heater().measure_at_profile(profile);
        self.logged(result)
    }

    pub fn read_raw_gas(&mut self) -> Result<(u16, u8), Bme688Error> {
        let result = bme688_heater::read_gas_adc(&mut self.io);
        self.logged(result)
    }
}
