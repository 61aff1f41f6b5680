/*
 * Created on Tue Sep 12 2023
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

//! Shared helpers for the moat tools
//!
//! This contains the command-line scanner, the version banner and the
//! terminal/formatting utilities that the `cli` crate builds on.

pub mod util;

use std::collections::{HashMap, HashSet};
use std::env;

/// What the process was asked to do, as decided by the raw command line
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// print the help text
    Help,
    /// print the version banner
    Version,
    /// run with the scanned arguments
    Run(CliArgs),
}

/// The scanned command line: `--option value` pairs, boolean switches and
/// positional arguments, in that order of appearance
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub options: HashMap<String, String>,
    pub switches: HashSet<String>,
    pub positional: Vec<String>,
}

#[derive(Debug, PartialEq)]
pub enum ArgScanError {
    /// the same option or switch was passed more than once
    Duplicate(String),
    /// an option that takes a value was passed without one
    MissingValue(String),
}

/// Scan the process arguments. Any argument named in `switches` is treated
/// as a boolean switch; every other `--option` consumes the following
/// argument as its value. Duplicates are rejected outright.
pub fn scan_cli_args(switches: &[&str]) -> Result<CliAction, ArgScanError> {
    scan_args(env::args().skip(1), switches)
}

fn scan_args(
    args: impl Iterator<Item = String>,
    switches: &[&str],
) -> Result<CliAction, ArgScanError> {
    let mut scanned = CliArgs::default();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            a if a.starts_with("--") => {
                if switches.contains(&a) {
                    if !scanned.switches.insert(a.to_owned()) {
                        return Err(ArgScanError::Duplicate(a.to_owned()));
                    }
                } else {
                    let value = match args.next() {
                        Some(v) if !v.starts_with("--") => v,
                        _ => return Err(ArgScanError::MissingValue(a.to_owned())),
                    };
                    if scanned.options.insert(a.to_owned(), value).is_some() {
                        return Err(ArgScanError::Duplicate(a.to_owned()));
                    }
                }
            }
            _ => scanned.positional.push(arg),
        }
    }
    Ok(CliAction::Run(scanned))
}

/// Returns a version banner for the given binary, for example:
/// `moatsh v0.3.1`
pub fn version_msg(binary: &str) -> String {
    format!("{binary} v{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::{scan_args, ArgScanError, CliAction, CliArgs};

    fn scan(cmd: &[&str], switches: &[&str]) -> Result<CliAction, ArgScanError> {
        scan_args(cmd.iter().map(|a| a.to_string()), switches)
    }

    #[test]
    fn scan_options_switches_and_positional() {
        let ret = scan(
            &["--input-file", "dump.sql", "--dry-run", "mymoat"],
            &["--dry-run"],
        )
        .unwrap();
        let args = match ret {
            CliAction::Run(args) => args,
            unexpected => panic!("unexpected action: {unexpected:?}"),
        };
        assert_eq!(args.options["--input-file"], "dump.sql");
        assert!(args.switches.contains("--dry-run"));
        assert_eq!(args.positional, vec!["mymoat".to_owned()]);
    }

    #[test]
    fn scan_help_short_circuits() {
        assert_eq!(scan(&["--help", "--bad"], &[]).unwrap(), CliAction::Help);
        assert_eq!(scan(&["-V"], &[]).unwrap(), CliAction::Version);
    }

    #[test]
    fn scan_rejects_duplicates() {
        assert_eq!(
            scan(&["--offset", "1", "--offset", "2"], &[]).unwrap_err(),
            ArgScanError::Duplicate("--offset".to_owned())
        );
        assert_eq!(
            scan(&["--sync", "--sync"], &["--sync"]).unwrap_err(),
            ArgScanError::Duplicate("--sync".to_owned())
        );
    }

    #[test]
    fn scan_rejects_missing_value() {
        assert_eq!(
            scan(&["--input-file"], &[]).unwrap_err(),
            ArgScanError::MissingValue("--input-file".to_owned())
        );
        assert_eq!(
            scan(&["--input-file", "--dry-run"], &["--dry-run"]).unwrap_err(),
            ArgScanError::MissingValue("--input-file".to_owned())
        );
    }

    #[test]
    fn scan_empty_is_a_plain_run() {
        assert_eq!(scan(&[], &[]).unwrap(), CliAction::Run(CliArgs::default()));
    }
}
