use super::bme688_calib::CalibrationSet;
use super::bme688_error::Bme688Error;

// -- heater range bits inside the res_heat_range calibration byte
const BME688_HEAT_RANGE_MASK: u8 = 0x18;
const BME688_HEAT_RANGE_SHR: u8 = 4;

// -- fine terms carried from one formula to the next within a session
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntermediateState {
    // -- written by temperature compensation, read by everything after it
    pub t_fine: f64,
    pub p_fine: f64,
    pub h_fine: f64,
    // -- last computed heater resistance code
    pub g_fine: u8,
}

impl IntermediateState {
    pub fn temperature(&self) -> f64 {
        self.t_fine / 5120.0
    }
}

pub fn compensate_temperature(calib: &CalibrationSet, state: &mut IntermediateState, temperature_raw: i32) -> f64 {
    let temperature_raw = temperature_raw as f64;
    let par_t1 = calib.par_t1 as f64;
    let par_t2 = calib.par_t2 as f64;
    let par_t3 = calib.par_t3 as f64;
    let var1 = ((temperature_raw / 16384.0) - (par_t1 / 1024.0)) * par_t2;
    let var2 = (((temperature_raw / 131072.0) - (par_t1 / 8192.0)) * ((temperature_raw / 131072.0) - (par_t1 / 8192.0))) * (par_t3 * 16.0);
    state.t_fine = var1 + var2;
    state.t_fine / 5120.0
}

pub fn compensate_pressure(calib: &CalibrationSet, state: &mut IntermediateState, pressure_raw: i32) -> Result<f64, Bme688Error> {
    let pressure_raw = pressure_raw as f64;
    let par_p1 = calib.par_p1 as f64;
    let par_p2 = calib.par_p2 as f64;
    let par_p3 = calib.par_p3 as f64;
    let par_p4 = calib.par_p4 as f64;
    let par_p5 = calib.par_p5 as f64;
    let par_p6 = calib.par_p6 as f64;
    let par_p7 = calib.par_p7 as f64;
    let par_p8 = calib.par_p8 as f64;
    let par_p9 = calib.par_p9 as f64;
    let par_p10 = calib.par_p10 as f64;
    let var1 = (state.t_fine / 2.0) - 64000.0;
    let var2 = var1 * var1 * (par_p6 / 131072.0);
    let var2 = var2 + (var1 * par_p5 * 2.0);
    let var2 = (var2 / 4.0) + (par_p4 * 65536.0);
    let var1 = (((par_p3 * var1 * var1) / 16384.0) + (par_p2 * var1)) / 524288.0;
    let var1 = (1.0 + (var1 / 32768.0)) * par_p1;
    // -- a zeroed or degenerate P1 would divide by zero below
    if var1 == 0.0 {
        return Err(Bme688Error::DivisionByZero)
    }
    let press_comp = 1048576.0 - pressure_raw;
    let press_comp = ((press_comp - (var2 / 4096.0)) * 6250.0) / var1;
    let var1 = (par_p9 * press_comp * press_comp) / 2147483648.0;
    let var2 = press_comp * (par_p8 / 32768.0);
    let var3 = (press_comp / 256.0) * (press_comp / 256.0) * (press_comp / 256.0) * (par_p10 / 131072.0);
    state.p_fine = press_comp + (var1 + var2 + var3 + (par_p7 * 128.0)) / 16.0;
    Ok(state.p_fine)
}

// -- relative humidity in percent. Not clamped to 0..100
pub fn compensate_humidity(calib: &CalibrationSet, state: &mut IntermediateState, humidity_raw: u16) -> f64 {
    let humidity_raw = humidity_raw as f64;
    let temperature = state.temperature();
    let par_h1 = calib.par_h1 as f64;
    let par_h2 = calib.par_h2 as f64;
    let par_h3 = calib.par_h3 as f64;
    let par_h4 = calib.par_h4 as f64;
    let par_h5 = calib.par_h5 as f64;
    let par_h6 = calib.par_h6 as f64;
    let par_h7 = calib.par_h7 as f64;
    let var1 = humidity_raw - ((par_h1 * 16.0) + ((par_h3 / 2.0) * temperature));
    let var2 = var1 * ((par_h2 / 262144.0) * (1.0 + ((par_h4 / 16384.0) * temperature) + ((par_h5 / 1048576.0) * temperature * temperature)));
    let var3 = par_h6 / 16384.0;
    let var4 = par_h7 / 2097152.0;
    state.h_fine = var2 + ((var3 + (var4 * temperature)) * var2 * var2);
    state.h_fine
}

// -- heater resistance code for a target plate temperature, using the current
// -- fine temperature as ambient. Out-of-range results saturate to 0..=255
pub fn compute_heater_code(calib: &CalibrationSet, state: &mut IntermediateState, target_temp: f64) -> u8 {
    let amb_temp = state.temperature();
    let res_heat_range = ((calib.res_heat_range & BME688_HEAT_RANGE_MASK) >> BME688_HEAT_RANGE_SHR) as f64;
    let res_heat_val = calib.res_heat_val as f64;
    let var1 = ((calib.par_g1 as f64) / 16.0) + 49.0;
    let var2 = (((calib.par_g2 as f64) / 32768.0) * 0.0005) + 0.00235;
    let var3 = (calib.par_g3 as f64) / 1024.0;
    let var4 = var1 * (1.0 + (var2 * target_temp));
    let var5 = var4 + (var3 * amb_temp);
    let res_heat_x = (3.4 * ((var5 * (4.0 / (4.0 + res_heat_range)) * (1.0 / (1.0 +
        (res_heat_val * 0.002)))) - 25.0)) as u8;
    state.g_fine = res_heat_x;
    res_heat_x
}
