/*
 *  main.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use anyhow::Context;
use env_logger::Env;
use log::{error, info};

use chiron::config;
use chiron::driver::Driver;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("could not load configuration")?;

    let log_level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("chiron starting (built {BUILD_DATE})");

    let seed = cfg.seed.unwrap_or(0xC41203);
    let mut driver = Driver::new(seed);

    // all managers and their data, all-or-nothing
    if let Err(e) = driver.initialize(&cfg) {
        error!("application failed to start: {e}");
        driver.cleanup();
        std::process::exit(1);
    }

    // the main loop
    driver.run();

    // release all app resources
    driver.cleanup();
    info!("chiron exiting");
    Ok(())
}
