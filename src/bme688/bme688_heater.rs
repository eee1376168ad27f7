use log::debug;

use crate::i2cio::{self, Delay, Endian, RegisterTransport};

use super::bme688_calib::CalibrationSet;
use super::bme688_comp::{self, IntermediateState};
use super::bme688_enums::{Bme688GasWaitMultiplicationFactor, Bme688HeaterProfile, Bme688OperatingMode};
use super::bme688_error::Bme688Error;

// -- gas control, status and result registers
const BME688_REG_CTRL_GAS_1: u8 = 0x71;
const BME688_REG_CTRL_MEAS: u8 = 0x74;
const BME688_REG_GAS_WAIT_BASE: u8 = 0x64;
const BME688_REG_RES_HEAT_BASE: u8 = 0x5a;
const BME688_REG_GAS_STATUS: u8 = 0x2d;
// -- ADC code and range nibble are both read starting at 0x2c
const BME688_REG_GAS_ADC: u8 = 0x2c;
const BME688_REG_GAS_RANGE: u8 = 0x2c;

// -- bits and masks
const BME688_GAS_RUN_BIT: u8 = 0x20;
const BME688_GAS_VALID_BIT: u8 = 0x20;
const BME688_HEAT_STAB_BIT: u8 = 0x10;
const BME688_GAS_MEAS_FINISHED: u8 = BME688_GAS_VALID_BIT | BME688_HEAT_STAB_BIT;
const BME688_GAS_RANGE_MASK: u8 = 0x0f;
const BME688_GAS_WAIT_MULT_FACT_SHL: u8 = 6;
const BME688_GAS_WAIT_DURATION_MASK: u8 = 0x3f;
const BME688_GAS_ADC_BITS: u8 = 10;

// -- heater plate limits in °C
pub const BME688_HEAT_PLATE_MAX_TEMP: u16 = 425;
pub const BME688_HEAT_PLATE_ULTRA_TEMP: u16 = 600;

// -- pre-seeded profiles: 200°C upwards in 25°C steps
const BME688_GAS_START_TEMP: u16 = 200;
const BME688_GAS_TEMP_STEP: u16 = 25;
// -- extra settle time for a directly programmed target temperature
const BME688_GAS_WAIT_MARGIN_MS: u8 = 5;

// -- progress of a single gas measurement
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum GasState {
    #[default]
    Idle,
    ProfileProgrammed,
    Running,
    Complete,
    Incomplete,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GasProfile {
    pub target_temp: u16,
    pub heater_code: u8,
    pub wait_code: u8,
    pub index: Bme688HeaterProfile,
}

impl GasProfile {

    pub fn for_temperature(calib: &CalibrationSet, state: &mut IntermediateState, target_temp: u16,
        index: Bme688HeaterProfile) -> GasProfile {
        let heater_code = bme688_comp::compute_heater_code(calib, state, target_temp as f64);
        GasProfile {
            target_temp,
            heater_code,
            wait_code: wait_code(heater_code, 17.0),
            index,
        }
    }

    // -- duration the wait-time code stands for on the chip: 6-bit base times 1/4/16/64
    pub fn wait_time_ms(&self) -> u32 {
        let mult_fact = Bme688GasWaitMultiplicationFactor::from_bits(self.wait_code >> BME688_GAS_WAIT_MULT_FACT_SHL);
        (self.wait_code & BME688_GAS_WAIT_DURATION_MASK) as u32 * mult_fact.factor()
    }
}

// -- linear in the heater code, saturates at 0
fn wait_code(heater_code: u8, offset: f64) -> u8 {
    (0.25 * heater_code as f64 - offset) as u8
}

// -- rejects targets at or above the hard ceiling, and above the soft ceiling unless overridden
pub fn check_target_temperature(target_temp: u16, allow_high_temps: bool) -> Result<(), Bme688Error> {
    if target_temp >= BME688_HEAT_PLATE_ULTRA_TEMP {
        return Err(Bme688Error::ThermalHardLimitExceeded { target: target_temp, limit: BME688_HEAT_PLATE_ULTRA_TEMP })
    }
    if target_temp > BME688_HEAT_PLATE_MAX_TEMP && !allow_high_temps {
        return Err(Bme688Error::ThermalSafetyRejected { target: target_temp, limit: BME688_HEAT_PLATE_MAX_TEMP })
    }
    Ok(())
}

// -- gas resistance in ohms from the 10-bit ADC code and the range nibble
pub fn gas_resistance(gas_adc: u16, gas_range: u8) -> f64 {
    let var1 = (262144u32 >> (gas_range & BME688_GAS_RANGE_MASK)) as f64;
    let var2 = 3.0 * (gas_adc as f64 - 512.0) + 4096.0;
    1000000.0 * var1 / var2
}

// -- heater profile controller for one device. Borrows the bus and the session
// -- state of the facade for the duration of a gas operation
pub struct HeaterController<'a, T: RegisterTransport, D: Delay> {
    pub io: &'a mut T,
    pub delay: &'a mut D,
    pub calib: &'a CalibrationSet,
    pub state: &'a mut IntermediateState,
    pub gas_state: &'a mut GasState,
    pub mode: Bme688OperatingMode,
}

impl<'a, T: RegisterTransport, D: Delay> HeaterController<'a, T, D> {

    // -- programs all ten profile slots against the current fine temperature
    pub fn program_profiles(&mut self) -> Result<(), Bme688Error> {
        for i in 0..Bme688HeaterProfile::COUNT {
            // -- let other work run between slots
            self.delay.yield_now();
            let target_temp = BME688_GAS_START_TEMP + i as u16 * BME688_GAS_TEMP_STEP;
            let heater_code = bme688_comp::compute_heater_code(self.calib, self.state, target_temp as f64);
            let wait = Bme688GasWaitMultiplicationFactor::X1.value() << BME688_GAS_WAIT_MULT_FACT_SHL
                | wait_code(heater_code, 22.0);
            debug!("Setting heater profile {i} to {target_temp}°C, res heat {heater_code:#04x}, gas wait {wait:#04x}");
            self.io.write_register(BME688_REG_GAS_WAIT_BASE + i, wait)?;
            self.io.write_register(BME688_REG_RES_HEAT_BASE + i, heater_code)?;
        }
        *self.gas_state = GasState::ProfileProgrammed;
        Ok(())
    }

    pub fn measure_at_temperature(&mut self, target_temp: u16, allow_high_temps: bool) -> Result<f64, Bme688Error> {
        check_target_temperature(target_temp, allow_high_temps)?;
        let profile = GasProfile::for_temperature(self.calib, self.state, target_temp, Bme688HeaterProfile::default());
        debug!("Programming {profile:?}");
        // -- gas enable, then wait time and heater resistance into slot 0
        self.io.write_register(BME688_REG_CTRL_GAS_1, BME688_GAS_RUN_BIT)?;
        self.io.write_register(BME688_REG_GAS_WAIT_BASE, profile.wait_code)?;
        self.io.write_register(BME688_REG_RES_HEAT_BASE, profile.heater_code)?;
        *self.gas_state = GasState::ProfileProgrammed;
        self.start_measurement(profile.index, profile.wait_code.saturating_add(BME688_GAS_WAIT_MARGIN_MS) as u32)
    }

    pub fn measure_at_profile(&mut self, index: u8) -> Result<f64, Bme688Error> {
        let index = Bme688HeaterProfile::try_from(index)?;
        let target_temp = BME688_GAS_START_TEMP * index.value() as u16;
        let profile = GasProfile::for_temperature(self.calib, self.state, target_temp, index);
        debug!("Using pre-programmed {profile:?}");
        self.start_measurement(profile.index, profile.wait_code as u32)
    }

    // -- runs the gas conversion on `index`, waits `wait_ms` and reads the result once
    pub fn start_measurement(&mut self, index: Bme688HeaterProfile, wait_ms: u32) -> Result<f64, Bme688Error> {
        self.io.write_register(BME688_REG_CTRL_GAS_1, BME688_GAS_RUN_BIT | index.value())?;
        // -- mode only, oversampling bits are cleared for the gas run
        self.io.write_register(BME688_REG_CTRL_MEAS, self.mode.value())?;
        *self.gas_state = GasState::Running;
        self.delay.delay_ms(wait_ms);
        let status = self.io.read_byte(BME688_REG_GAS_STATUS)
            .map_err(|source| Bme688Error::ReadFailure { register: BME688_REG_GAS_STATUS, source })?
            & BME688_GAS_MEAS_FINISHED;
        if status != BME688_GAS_MEAS_FINISHED {
            *self.gas_state = GasState::Incomplete;
            return Err(Bme688Error::GasMeasurementIncomplete { status })
        }
        let (gas_adc, gas_range) = read_gas_adc(self.io)?;
        let gas_res = gas_resistance(gas_adc, gas_range);
        debug!("Got gas adc {gas_adc}, range {gas_range}, resistance {gas_res}");
        *self.gas_state = GasState::Complete;
        Ok(gas_res)
    }
}

// -- raw gas ADC code and range nibble. Both are read starting at 0x2c, matching
// -- the layout the compensation was tuned against
pub fn read_gas_adc<T: RegisterTransport + ?Sized>(io: &mut T) -> Result<(u16, u8), Bme688Error> {
    let gas_adc: u16 = i2cio::read_bits(io, BME688_REG_GAS_ADC, BME688_GAS_ADC_BITS, Endian::Big)
        .map_err(|source| Bme688Error::ReadFailure { register: BME688_REG_GAS_ADC, source })?;
    let gas_range = io.read_byte(BME688_REG_GAS_RANGE)
        .map_err(|source| Bme688Error::ReadFailure { register: BME688_REG_GAS_RANGE, source })?
        & BME688_GAS_RANGE_MASK;
    Ok((gas_adc, gas_range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme688::bme688_calib::fixtures;
    use crate::i2cio::testing::{FakeBus, RecordingDelay};
    use test_log::test;

    const TEMPERATURE_RAW: i32 = 500000;

    struct Rig {
        bus: FakeBus,
        delay: RecordingDelay,
        calib: CalibrationSet,
        state: IntermediateState,
        gas_state: GasState,
    }

    impl Rig {
        fn new(status: u8) -> Rig {
            let calib = fixtures::expected();
            let mut state = IntermediateState::default();
            bme688_comp::compensate_temperature(&calib, &mut state, TEMPERATURE_RAW);
            // -- adc 0x200 and range nibble 0 in the shared byte
            let bus = FakeBus::with_regs(&[(0x2c, 0x80), (0x2d, status)]);
            Rig { bus, delay: RecordingDelay::default(), calib, state, gas_state: GasState::Idle }
        }

        fn controller(&mut self) -> HeaterController<'_, FakeBus, RecordingDelay> {
            HeaterController {
                io: &mut self.bus,
                delay: &mut self.delay,
                calib: &self.calib,
                state: &mut self.state,
                gas_state: &mut self.gas_state,
                mode: Bme688OperatingMode::Forced,
            }
        }
    }

    #[test]
    fn resistance_table() {
        let table: [(u16, u8, f64); 8] = [
            (512, 0, 64000000.0),
            (0, 0, 102400000.0),
            (1023, 0, 46570261.14762835),
            (512, 3, 8000000.0),
            (700, 5, 1757939.91416309),
            (300, 7, 591907.5144508671),
            (1023, 7, 363830.1652158465),
            (100, 15, 2797.2027972027972),
        ];
        for (gas_adc, gas_range, ohms) in table {
            let gas_res = gas_resistance(gas_adc, gas_range);
            assert!((gas_res - ohms).abs() <= ohms * 1e-12, "adc {gas_adc} range {gas_range}: {gas_res}");
        }
    }

    #[test]
    fn thermal_ceilings() {
        for target in [600, 601, 1000, u16::MAX] {
            assert!(matches!(check_target_temperature(target, false), Err(Bme688Error::ThermalHardLimitExceeded { .. })));
            assert!(matches!(check_target_temperature(target, true), Err(Bme688Error::ThermalHardLimitExceeded { .. })));
        }
        for target in [426, 500, 599] {
            assert!(matches!(check_target_temperature(target, false), Err(Bme688Error::ThermalSafetyRejected { .. })));
            assert!(check_target_temperature(target, true).is_ok());
        }
        for target in [0, 200, 425] {
            assert!(check_target_temperature(target, false).is_ok());
        }
    }

    #[test]
    fn wait_time_decoding() {
        let profile = GasProfile {
            target_temp: 300, heater_code: 0, wait_code: 0x59, index: Bme688HeaterProfile::default(),
        };
        // -- 0x19 ms times 4
        assert_eq!(profile.wait_time_ms(), 100);
    }

    #[test]
    fn program_profiles_writes_ten_slots() {
        let mut rig = Rig::new(0x30);
        rig.controller().program_profiles().unwrap();
        let res_heat: Vec<u8> = (0..10).map(|i| rig.bus.regs[0x5a + i]).collect();
        let gas_wait: Vec<u8> = (0..10).map(|i| rig.bus.regs[0x64 + i]).collect();
        assert_eq!(res_heat, vec![88, 95, 101, 108, 114, 121, 128, 134, 141, 147]);
        assert_eq!(gas_wait, vec![0, 1, 3, 5, 6, 8, 10, 11, 13, 14]);
        assert_eq!(rig.bus.writes.len(), 20);
        assert_eq!(rig.delay.yields, 10);
        assert_eq!(rig.gas_state, GasState::ProfileProgrammed);
    }

    #[test]
    fn measure_at_temperature_programs_slot_zero() {
        let mut rig = Rig::new(0x30);
        let gas_res = rig.controller().measure_at_temperature(320, false).unwrap();
        assert_eq!(gas_res, 64000000.0);
        // -- heater code 120, wait code 0.25 * 120 - 17 = 13
        assert_eq!(rig.bus.writes, vec![(0x71, 0x20), (0x64, 13), (0x5a, 120), (0x71, 0x20), (0x74, 0x01)]);
        assert_eq!(rig.delay.delays, vec![18]);
        assert_eq!(rig.state.g_fine, 120);
        assert_eq!(rig.gas_state, GasState::Complete);
    }

    #[test]
    fn measure_at_temperature_honours_override() {
        let mut rig = Rig::new(0x30);
        assert!(matches!(rig.controller().measure_at_temperature(450, false),
            Err(Bme688Error::ThermalSafetyRejected { target: 450, limit: 425 })));
        assert!(rig.bus.writes.is_empty());
        assert!(rig.controller().measure_at_temperature(450, true).is_ok());
        assert_eq!(rig.bus.writes_to(0x5a), vec![154]);
    }

    #[test]
    fn measure_at_temperature_rejects_hard_limit() {
        let mut rig = Rig::new(0x30);
        assert!(matches!(rig.controller().measure_at_temperature(600, true),
            Err(Bme688Error::ThermalHardLimitExceeded { target: 600, limit: 600 })));
        assert!(rig.bus.writes.is_empty());
        assert!(rig.delay.delays.is_empty());
        assert_eq!(rig.gas_state, GasState::Idle);
    }

    #[test]
    fn measure_at_profile_selects_slot() {
        let mut rig = Rig::new(0x30);
        let gas_res = rig.controller().measure_at_profile(2).unwrap();
        assert_eq!(gas_res, 64000000.0);
        assert_eq!(rig.bus.writes, vec![(0x71, 0x22), (0x74, 0x01)]);
        // -- 400°C gives heater code 141, 0.25 * 141 - 17 = 18
        assert_eq!(rig.delay.delays, vec![18]);
    }

    #[test]
    fn measure_at_profile_rejects_out_of_range_index() {
        let mut rig = Rig::new(0x30);
        for index in [10, 11, 255] {
            assert!(matches!(rig.controller().measure_at_profile(index),
                Err(Bme688Error::InvalidArgument { what: "heater profile", .. })));
        }
        assert!(rig.bus.writes.is_empty());
        assert!(rig.delay.delays.is_empty());
    }

    #[test]
    fn incomplete_measurement_is_not_retried() {
        for status in [0x00, 0x10, 0x20] {
            let mut rig = Rig::new(status);
            let result = rig.controller().start_measurement(Bme688HeaterProfile::default(), 40);
            assert!(matches!(result, Err(Bme688Error::GasMeasurementIncomplete { .. })));
            assert_eq!(rig.delay.delays, vec![40]);
            assert_eq!(rig.bus.writes.len(), 2);
            assert_eq!(rig.gas_state, GasState::Incomplete);
        }
    }

    #[test]
    fn status_bits_outside_the_mask_are_ignored() {
        let mut rig = Rig::new(0xb3);
        assert!(rig.controller().start_measurement(Bme688HeaterProfile::default(), 40).is_ok());
    }

    #[test]
    fn adc_and_range_share_register_0x2c() {
        // -- msb 0xff, lsb 0xc5: adc 0x3ff from both bytes, range from the low nibble of 0x2c
        let mut bus = FakeBus::with_regs(&[(0x2c, 0xff), (0x2d, 0xc5)]);
        assert_eq!(read_gas_adc(&mut bus).unwrap(), (0x3ff, 0x0f));
        let mut bus = FakeBus::with_regs(&[(0x2c, 0x83), (0x2d, 0x40)]);
        assert_eq!(read_gas_adc(&mut bus).unwrap(), (0x20d, 0x03));
    }
}
