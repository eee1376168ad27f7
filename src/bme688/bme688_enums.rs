use std::fmt;

use super::bme688_error::Bme688Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Bme688DeviceAddress {
    Primary,
    Secondary,
}

impl Default for Bme688DeviceAddress {
    fn default() -> Self {
        Self::Primary
    }
}

impl Bme688DeviceAddress {
    const ADDR_PRIMARY: u16 = 0x76;
    const ADDR_SECONDARY: u16 = 0x77;

    pub fn value(&self) -> u16 {
        match *self {
            Self::Primary => Self::ADDR_PRIMARY,
            Self::Secondary => Self::ADDR_SECONDARY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme688OperatingMode {
    Sleep,
    Forced,
    Parallel,
}

impl Bme688OperatingMode {
    const MODE_SLEEP: u8 = 0x00;
    const MODE_FORCED: u8 = 0x01;
    const MODE_PARALLEL: u8 = 0x02;

    pub fn value(&self) -> u8 {
        match *self {
            Self::Sleep => Self::MODE_SLEEP,
            Self::Forced => Self::MODE_FORCED,
            Self::Parallel => Self::MODE_PARALLEL,
        }
    }
}

impl TryFrom<u8> for Bme688OperatingMode {
    type Error = Bme688Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            Self::MODE_SLEEP => Ok(Self::Sleep),
            Self::MODE_FORCED => Ok(Self::Forced),
            Self::MODE_PARALLEL => Ok(Self::Parallel),
            _ => Err(Bme688Error::InvalidArgument { what: "operating mode", value: value as u32 }),
        }
    }
}

impl fmt::Display for Bme688OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Sleep => write!(f, "Sleep/{:#04x}", self.value()),
            Self::Forced => write!(f, "Forced/{:#04x}", self.value()),
            Self::Parallel => write!(f, "Parallel/{:#04x}", self.value()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme688OverSampling {
    NoOversampling,
    Oversampling1x,
    Oversampling2x,
    Oversampling4x,
    Oversampling8x,
    Oversampling16x,
}

impl Bme688OverSampling {
    const NO_OVERSAMPLING: u8 = 0x00;
    const OVERSAMPLING_1X: u8 = 0x01;
    const OVERSAMPLING_2X: u8 = 0x02;
    const OVERSAMPLING_4X: u8 = 0x03;
    const OVERSAMPLING_8X: u8 = 0x04;
    const OVERSAMPLING_16X: u8 = 0x05;

    pub fn value(&self) -> u8 {
        match *self {
            Self::NoOversampling => Self::NO_OVERSAMPLING,
            Self::Oversampling1x => Self::OVERSAMPLING_1X,
            Self::Oversampling2x => Self::OVERSAMPLING_2X,
            Self::Oversampling4x => Self::OVERSAMPLING_4X,
            Self::Oversampling8x => Self::OVERSAMPLING_8X,
            Self::Oversampling16x => Self::OVERSAMPLING_16X,
        }
    }
}

impl TryFrom<u8> for Bme688OverSampling {
    type Error = Bme688Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            Self::NO_OVERSAMPLING => Ok(Self::NoOversampling),
            Self::OVERSAMPLING_1X => Ok(Self::Oversampling1x),
            Self::OVERSAMPLING_2X => Ok(Self::Oversampling2x),
            Self::OVERSAMPLING_4X => Ok(Self::Oversampling4x),
            Self::OVERSAMPLING_8X => Ok(Self::Oversampling8x),
            Self::OVERSAMPLING_16X => Ok(Self::Oversampling16x),
            _ => Err(Bme688Error::InvalidArgument { what: "oversampling", value: value as u32 }),
        }
    }
}

impl fmt::Display for Bme688OverSampling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NoOversampling => write!(f, "NoOversampling/{:#04x}", self.value()),
            Self::Oversampling1x => write!(f, "Oversampling1x/{:#04x}", self.value()),
            Self::Oversampling2x => write!(f, "Oversampling2x/{:#04x}", self.value()),
            Self::Oversampling4x => write!(f, "Oversampling4x/{:#04x}", self.value()),
            Self::Oversampling8x => write!(f, "Oversampling8x/{:#04x}", self.value()),
            Self::Oversampling16x => write!(f, "Oversampling16x/{:#04x}", self.value()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme688IirFilter {
    FilterOff,
    Coef1,
    Coef3,
    Coef7,
    Coef15,
    Coef31,
    Coef63,
    Coef127,
}

impl Bme688IirFilter {
    const FILTER_COEFF_OFF: u8 = 0x00;
    const FILTER_COEFF_1: u8 = 0x01;
    const FILTER_COEFF_3: u8 = 0x02;
    const FILTER_COEFF_7: u8 = 0x03;
    const FILTER_COEFF_15: u8 = 0x04;
    const FILTER_COEFF_31: u8 = 0x05;
    const FILTER_COEFF_63: u8 = 0x06;
    const FILTER_COEFF_127: u8 = 0x07;

    pub fn value(&self) -> u8 {
        match *self {
            Self::FilterOff => Self::FILTER_COEFF_OFF,
            Self::Coef1 => Self::FILTER_COEFF_1,
            Self::Coef3 => Self::FILTER_COEFF_3,
            Self::Coef7 => Self::FILTER_COEFF_7,
            Self::Coef15 => Self::FILTER_COEFF_15,
            Self::Coef31 => Self::FILTER_COEFF_31,
            Self::Coef63 => Self::FILTER_COEFF_63,
            Self::Coef127 => Self::FILTER_COEFF_127,
        }
    }
}

impl fmt::Display for Bme688IirFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::FilterOff => write!(f, "FilterOff/{:#04x}", self.value()),
            Self::Coef1 => write!(f, "Coefficient 1/{:#04x}", self.value()),
            Self::Coef3 => write!(f, "Coefficient 3/{:#04x}", self.value()),
            Self::Coef7 => write!(f, "Coefficient 7/{:#04x}", self.value()),
            Self::Coef15 => write!(f, "Coefficient 15/{:#04x}", self.value()),
            Self::Coef31 => write!(f, "Coefficient 31/{:#04x}", self.value()),
            Self::Coef63 => write!(f, "Coefficient 63/{:#04x}", self.value()),
            Self::Coef127 => write!(f, "Coefficient 127/{:#04x}", self.value()),
        }
    }
}

// -- heater profile slot, one of the ten contiguous wait-time / resistance pairs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bme688HeaterProfile(u8);

impl Bme688HeaterProfile {
    pub const COUNT: u8 = 10;

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Bme688HeaterProfile {
    fn default() -> Self {
        Self(0)
    }
}

impl TryFrom<u8> for Bme688HeaterProfile {
    type Error = Bme688Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            Ok(Self(value))
        } else {
            Err(Bme688Error::InvalidArgument { what: "heater profile", value: value as u32 })
        }
    }
}

impl fmt::Display for Bme688HeaterProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SetPoint{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme688GasWaitMultiplicationFactor {
    X1,
    X4,
    X16,
    X64,
}

impl Bme688GasWaitMultiplicationFactor {
    pub fn value(&self) -> u8 {
        match *self {
            Self::X1 => 0,
            Self::X4 => 1,
            Self::X16 => 2,
            Self::X64 => 3,
        }
    }

    pub fn factor(&self) -> u32 {
        match *self {
            Self::X1 => 1,
            Self::X4 => 4,
            Self::X16 => 16,
            Self::X64 => 64,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::X1,
            1 => Self::X4,
            2 => Self::X16,
            _ => Self::X64,
        }
    }
}

// -- oversampling, mode and safety settings read by every measurement
#[derive(Clone, Debug, PartialEq)]
pub struct OperatingConfig {
    pub temperature_osr: Bme688OverSampling,
    pub pressure_osr: Bme688OverSampling,
    pub humidity_osr: Bme688OverSampling,
    pub mode: Bme688OperatingMode,
    pub iir_filter: Bme688IirFilter,
    // -- lifts the soft heater ceiling, the hard ceiling still applies
    pub allow_high_temps: bool,
    pub show_logs: bool,
}

impl Default for OperatingConfig {
    fn default() -> Self {
        OperatingConfig {
            temperature_osr: Bme688OverSampling::Oversampling1x,
            pressure_osr: Bme688OverSampling::Oversampling1x,
            humidity_osr: Bme688OverSampling::Oversampling1x,
            mode: Bme688OperatingMode::Forced,
            iir_filter: Bme688IirFilter::Coef15,
            allow_high_temps: false,
            show_logs: false,
        }
    }
}

impl OperatingConfig {
    const CTRL_MEAS_TEMPERATURE_SHL: u8 = 5;
    const CTRL_MEAS_PRESSURE_SHL: u8 = 2;

    pub fn ctrl_meas(&self) -> u8 {
        self.temperature_osr.value() << Self::CTRL_MEAS_TEMPERATURE_SHL
            | self.pressure_osr.value() << Self::CTRL_MEAS_PRESSURE_SHL
            | self.mode.value()
    }

    pub fn set_temperature_oversampling(&mut self, osr: u8) -> Result<(), Bme688Error> {
        self.temperature_osr = Bme688OverSampling::try_from(osr)?;
        Ok(())
    }

    pub fn set_pressure_oversampling(&mut self, osr: u8) -> Result<(), Bme688Error> {
        self.pressure_osr = Bme688OverSampling::try_from(osr)?;
        Ok(())
    }

    pub fn set_humidity_oversampling(&mut self, osr: u8) -> Result<(), Bme688Error> {
        self.humidity_osr = Bme688OverSampling::try_from(osr)?;
        Ok(())
    }
}
