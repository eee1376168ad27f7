use chrono::Local;
use clap::Parser;
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;
use std::{thread, time};

use bme688_i2c::bme688::*;

const EXIT_CODE_SET_CTR_C_HNDLR_FAILED: u8 = 0x02;
const EXIT_CODE_BME688_OPEN_FAILED: u8 = 0x81;
const EXIT_CODE_BME688_INIT_FAILED: u8 = 0x82;
const EXIT_CODE_BME688_INVALID_PROFILE: u8 = 0x83;

#[derive(Parser)]
struct Args {
    // -- i2c bus device
    bus_path: String,
    // -- use the secondary device address 0x77
    #[arg(long)]
    secondary: bool,
    // -- heater target temperature in °C, ignored when a profile is given
    #[arg(long, default_value_t = 320)]
    target_temp: u16,
    // -- pre-programmed heater profile 0..9
    #[arg(long)]
    profile: Option<u8>,
    // -- delay between measurements in seconds
    #[arg(long, default_value_t = 5)]
    interval: u64,
    // -- allow heater temperatures above the safe limit
    #[arg(long)]
    allow_high_temps: bool,
}

fn main() -> ExitCode {

    // -- read .env file
    dotenv::dotenv().ok();
    // -- setup logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let now = Local::now();
    info!("Starting up: {now}");

    let args = Args::parse();
    let bus_path = args.bus_path;
    info!("Using i2c bus device {bus_path}");

    // -- set handler for Ctrl-C
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, terminating...");
        std::process::exit(0);
    }) {
        error!("ERROR - Failed to set Ctrl-C handler: {err}");
        return ExitCode::from(EXIT_CODE_SET_CTR_C_HNDLR_FAILED);
    }

    if let Some(profile) = args.profile {
        if let Err(err) = Bme688HeaterProfile::try_from(profile) {
            error!("ERROR - {err}");
            return ExitCode::from(EXIT_CODE_BME688_INVALID_PROFILE);
        }
    }

    info!("Initializing BME688");
    let bus_path = Path::new(&bus_path);
    let dev_addr = if args.secondary { Bme688DeviceAddress::Secondary } else { Bme688DeviceAddress::Primary };
    let mut bme688 = match BME688::open(bus_path, dev_addr) {
        Ok(bme688) => bme688,
        Err(err) => {
            error!("ERROR - Failed to open BME688: {err}");
            return ExitCode::from(EXIT_CODE_BME688_OPEN_FAILED);
        }
    };
    bme688.show_logs(true);
    bme688.set_iir_filter(Bme688IirFilter::Coef3);
    if let Err(err) = bme688.try_begin() {
        error!("ERROR - Failed to initialize BME688: {err}");
        return ExitCode::from(EXIT_CODE_BME688_INIT_FAILED);
    }
    let chip_id = bme688.get_chip_id();
    info!("Got chip id {chip_id:#04x}");
    if args.allow_high_temps {
        bme688.ignore_unsafe_temperature_warnings(true);
    }

    loop {
        // -- temperature first, the other readings depend on it
        let temperature = bme688.read_temperature().or_sentinel();
        let pressure = bme688.read_pressure().or_sentinel();
        let humidity = bme688.read_humidity().or_sentinel();
        info!("Got temperature {temperature}°C, pressure {pressure}Pa, humidity {humidity}%");

        let gas_result = match args.profile {
            Some(profile) => bme688.read_gas(profile),
            None => bme688.read_gas_for_temperature(args.target_temp),
        };
        match gas_result {
            Ok(gas_res) => info!("Got gas resistance {gas_res} Ohm"),
            Err(Bme688Error::GasMeasurementIncomplete { status }) => {
                warn!("Gas measurement incomplete with status {status:#04x}, skipping");
            }
            Err(err) => error!("ERROR - BME688 failed gas measurement: {err}"),
        }

        // -- delay next measuring
        let measuring_delay = time::Duration::from_millis(args.interval * 1000);
        thread::sleep(measuring_delay);
    }
}
