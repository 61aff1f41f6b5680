/*
 * Created on Wed Sep 20 2023
 *
 * This file is a part of the Moat database client
 * The Moat client (moatsh) is a free and open-source interactive and batch
 * SQL client for remote "moat" database targets, with support for connection
 * profiles, bulk statement imports and usage accounting.
 *
 * Copyright (c) 2023, the moatsh authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

#[macro_use]
extern crate log;

macro_rules! fatal {
    ($($arg:tt)*) => {{
        eprintln!($($arg)*);
        std::process::exit(0x01);
    }}
}

mod args;
mod config;
mod connector;
mod error;
mod import;
mod lexer;
mod progress;
mod repl;
mod resp;
mod sync;

use {
    crate::{
        args::{ClientConfig, Task},
        connector::{fetch_usage, MoatConnection},
        error::{CliError, CliResult},
        import::{ImportConfig, WindowPolicy},
        progress::ConsoleReport,
    },
    std::env,
};

fn main() {
    // the filter stays wide open; `--debug` and the shell's debug command
    // gate verbosity through the global max level instead
    env_logger::Builder::new()
        .parse_filters(&env::var("MOATSH_LOG").unwrap_or_else(|_| "debug".to_owned()))
        .init();
    match run() {
        Ok(()) => {}
        Err(e) => fatal!("moatsh error: {e}"),
    }
}

fn run() -> CliResult<()> {
    match args::parse()? {
        Task::HelpMessage(msg) => println!("{msg}"),
        Task::Run(cfg) => {
            log::set_max_level(if cfg.debug {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            });
            match cfg.input_file.clone() {
                Some(input_file) => import_sql_file(cfg, input_file)?,
                None => repl::start(cfg)?,
            }
        }
    }
    Ok(())
}

fn import_sql_file(cfg: ClientConfig, input_file: String) -> CliResult<()> {
    // importing requires an explicitly selected moat
    let moat = cfg.moat.as_deref().ok_or_else(|| {
        CliError::ConfigError("a moat must be specified to import SQL".to_owned())
    })?;
    let dir = config::ConfigDir::open(&cfg.config_dir)?;
    let profile = dir.load(moat)?;
    let mut con = MoatConnection::connect(&profile)?;
    let usage = fetch_usage(&mut con)?;
    let import_cfg = ImportConfig {
        input_file,
        error_file: cfg.error_file.clone(),
        output_file: cfg.output_file.clone(),
        window: WindowPolicy {
            offset: cfg.offset,
            limit: cfg.limit,
        },
        sync: cfg.sync,
        dry_run: cfg.dry_run,
        exit_on_error: cfg.exit_on_error,
    };
    let mut progress = ConsoleReport::new();
    import::run_import(&mut con, &import_cfg, Some(&usage), &mut progress)?;
    Ok(())
}
