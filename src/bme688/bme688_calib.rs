use log::debug;

use crate::i2cio::{self, Endian, FromBits, I2cError, RegisterTransport};

use super::bme688_error::{Bme688Error, CalibrationDomain};

// -- registers for calibration data
const BME688_REG_CALIB_PAR_T1: u8 = 0xe9;
const BME688_REG_CALIB_PAR_T2: u8 = 0x8a;
const BME688_REG_CALIB_PAR_T3: u8 = 0x8c;
const BME688_REG_CALIB_PAR_P1: u8 = 0x8e;
const BME688_REG_CALIB_PAR_P2: u8 = 0x90;
const BME688_REG_CALIB_PAR_P3: u8 = 0x92;
const BME688_REG_CALIB_PAR_P4: u8 = 0x94;
const BME688_REG_CALIB_PAR_P5: u8 = 0x96;
// -- P6 and P7 sit in reversed order on the chip
const BME688_REG_CALIB_PAR_P6: u8 = 0x99;
const BME688_REG_CALIB_PAR_P7: u8 = 0x98;
const BME688_REG_CALIB_PAR_P8: u8 = 0x9c;
const BME688_REG_CALIB_PAR_P9: u8 = 0x9e;
const BME688_REG_CALIB_PAR_P10: u8 = 0xa0;
const BME688_REG_CALIB_PAR_H1: u8 = 0xe2;
const BME688_REG_CALIB_PAR_H2: u8 = 0xe1;
const BME688_REG_CALIB_PAR_H3: u8 = 0xe4;
const BME688_REG_CALIB_PAR_H4: u8 = 0xe5;
const BME688_REG_CALIB_PAR_H5: u8 = 0xe6;
const BME688_REG_CALIB_PAR_H6: u8 = 0xe7;
const BME688_REG_CALIB_PAR_H7: u8 = 0xe8;
const BME688_REG_CALIB_PAR_G1: u8 = 0xed;
const BME688_REG_CALIB_PAR_G2: u8 = 0xeb;
const BME688_REG_CALIB_PAR_G3: u8 = 0xee;
const BME688_REG_CALIB_RES_HEAT_RANGE: u8 = 0x02;
const BME688_REG_CALIB_RES_HEAT_VAL: u8 = 0x00;

// -- factory calibration coefficients, read once per session
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationSet {
    // -- calibration coefficients for temperature
    pub par_t1: i16,
    pub par_t2: i16,
    pub par_t3: i8,
    // -- calibration coefficients for pressure
    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,
    // -- calibration coefficients for humidity
    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
    // -- calibration coefficients for gas
    pub par_g1: i8,
    pub par_g2: i16,
    pub par_g3: i8,
    pub res_heat_range: u8,
    pub res_heat_val: i8,
}

// -- outcome of a best-effort calibration read. Fields of a failed domain that
// -- were read before the failure keep their value, the rest stay zero
#[derive(Debug)]
pub struct CalibrationLoad {
    pub calib: CalibrationSet,
    pub failures: Vec<(CalibrationDomain, I2cError)>,
}

impl CalibrationLoad {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    // -- strict view: the first failed domain becomes the error
    pub fn into_result(self) -> Result<CalibrationSet, Bme688Error> {
        match self.failures.into_iter().next() {
            None => Ok(self.calib),
            Some((domain, source)) => Err(Bme688Error::CalibrationRead { domain, source }),
        }
    }
}

fn read_byte<T: FromBits, R: RegisterTransport + ?Sized>(io: &mut R, register: u8) -> Result<T, I2cError> {
    i2cio::read_bits(io, register, 8, Endian::Little)
}

fn read_word<T: FromBits, R: RegisterTransport + ?Sized>(io: &mut R, register: u8) -> Result<T, I2cError> {
    i2cio::read_bits(io, register, 16, Endian::Little)
}

impl CalibrationSet {

    pub fn load<R: RegisterTransport + ?Sized>(io: &mut R) -> CalibrationLoad {
        let mut calib = CalibrationSet::default();
        let mut failures = Vec::new();
        let domains: [(CalibrationDomain, fn(&mut CalibrationSet, &mut R) -> Result<(), I2cError>); 4] = [
            (CalibrationDomain::Temperature, Self::read_temperature_params),
            (CalibrationDomain::Pressure, Self::read_pressure_params),
            (CalibrationDomain::Humidity, Self::read_humidity_params),
            (CalibrationDomain::Gas, Self::read_gas_params),
        ];
        for (domain, read_params) in domains {
            if let Err(err) = read_params(&mut calib, io) {
                debug!("Failed to read {domain} calibration parameters: {err}");
                failures.push((domain, err));
            }
        }
        debug!("Got calibration data: {calib:#?}");
        CalibrationLoad { calib, failures }
    }

    fn read_temperature_params<R: RegisterTransport + ?Sized>(&mut self, io: &mut R) -> Result<(), I2cError> {
        self.par_t1 = read_word(io, BME688_REG_CALIB_PAR_T1)?;
        self.par_t2 = read_word(io, BME688_REG_CALIB_PAR_T2)?;
        self.par_t3 = read_byte(io, BME688_REG_CALIB_PAR_T3)?;
        Ok(())
    }

    fn read_pressure_params<R: RegisterTransport + ?Sized>(&mut self, io: &mut R) -> Result<(), I2cError> {
        self.par_p1 = read_word(io, BME688_REG_CALIB_PAR_P1)?;
        self.par_p2 = read_word(io, BME688_REG_CALIB_PAR_P2)?;
        self.par_p3 = read_byte(io, BME688_REG_CALIB_PAR_P3)?;
        self.par_p4 = read_word(io, BME688_REG_CALIB_PAR_P4)?;
        self.par_p5 = read_word(io, BME688_REG_CALIB_PAR_P5)?;
        self.par_p6 = read_byte(io, BME688_REG_CALIB_PAR_P6)?;
        self.par_p7 = read_byte(io, BME688_REG_CALIB_PAR_P7)?;
        self.par_p8 = read_word(io, BME688_REG_CALIB_PAR_P8)?;
        self.par_p9 = read_word(io, BME688_REG_CALIB_PAR_P9)?;
        self.par_p10 = read_byte(io, BME688_REG_CALIB_PAR_P10)?;
        Ok(())
    }

    fn read_humidity_params<R: RegisterTransport + ?Sized>(&mut self, io: &mut R) -> Result<(), I2cError> {
        // -- H1 and H2 share the byte at 0xe2 and are packed with opposite byte order
        self.par_h1 = i2cio::read_bits(io, BME688_REG_CALIB_PAR_H1, 12, Endian::Little)?;
        self.par_h2 = i2cio::read_bits(io, BME688_REG_CALIB_PAR_H2, 12, Endian::Big)?;
        self.par_h3 = read_byte(io, BME688_REG_CALIB_PAR_H3)?;
        self.par_h4 = read_byte(io, BME688_REG_CALIB_PAR_H4)?;
        self.par_h5 = read_byte(io, BME688_REG_CALIB_PAR_H5)?;
        self.par_h6 = read_byte(io, BME688_REG_CALIB_PAR_H6)?;
        self.par_h7 = read_byte(io, BME688_REG_CALIB_PAR_H7)?;
        Ok(())
    }

    fn read_gas_params<R: RegisterTransport + ?Sized>(&mut self, io: &mut R) -> Result<(), I2cError> {
        self.par_g1 = read_byte(io, BME688_REG_CALIB_PAR_G1)?;
        self.par_g2 = read_word(io, BME688_REG_CALIB_PAR_G2)?;
        self.par_g3 = read_byte(io, BME688_REG_CALIB_PAR_G3)?;
        // -- masked to the range bits when used
        self.res_heat_range = read_byte(io, BME688_REG_CALIB_RES_HEAT_RANGE)?;
        self.res_heat_val = read_byte(io, BME688_REG_CALIB_RES_HEAT_VAL)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) const CALIB_REGS: [(u8, u8); 34] = [
        // -- temperature: T1 = 26000, T2 = 26500, T3 = 3
        (0xe9, 0x90), (0xea, 0x65), (0x8a, 0x84), (0x8b, 0x67), (0x8c, 0x03),
        // -- pressure
        (0x8e, 0xa0), (0x8f, 0x8c), (0x90, 0x60), (0x91, 0xd7), (0x92, 0x58),
        (0x94, 0x2c), (0x95, 0x1a), (0x96, 0x4c), (0x97, 0xff), (0x98, 0x2e),
        (0x99, 0x1e), (0x9c, 0x48), (0x9d, 0xf4), (0x9e, 0x3c), (0x9f, 0xf6),
        (0xa0, 0x1e),
        // -- humidity
        (0xe1, 0x3f), (0xe2, 0x2c), (0xe3, 0x32), (0xe4, 0x00), (0xe5, 0x2d),
        (0xe6, 0x14), (0xe7, 0x78), (0xe8, 0x9c),
        // -- gas
        (0xeb, 0xf0), (0xec, 0xd8), (0xed, 0xec), (0xee, 0x12),
        (0x02, 0x12),
    ];

    pub(crate) const RES_HEAT_VAL_REG: (u8, u8) = (0x00, 0x2a);

    pub(crate) fn expected() -> CalibrationSet {
        CalibrationSet {
            par_t1: 26000, par_t2: 26500, par_t3: 3,
            par_p1: 36000, par_p2: -10400, par_p3: 88, par_p4: 6700, par_p5: -180,
            par_p6: 30, par_p7: 46, par_p8: -3000, par_p9: -2500, par_p10: 30,
            // -- (0x322c >> 4) and (0x3f2c >> 4)
            par_h1: 0x322, par_h2: 0x3f2,
            par_h3: 0, par_h4: 45, par_h5: 20, par_h6: 120, par_h7: -100,
            par_g1: -20, par_g2: -10000, par_g3: 18,
            res_heat_range: 0x12, res_heat_val: 42,
        }
    }

    pub(crate) fn all_regs() -> Vec<(u8, u8)> {
        let mut regs = CALIB_REGS.to_vec();
        regs.push(RES_HEAT_VAL_REG);
        regs
    }
}
