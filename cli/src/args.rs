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

use {
    crate::{
        config,
        error::{CliError, CliResult},
        sync::SyncMode,
    },
    libmoat::{CliAction, CliArgs},
};

const TXT_HELP: &str = include_str!("../help_text/help");

const SWITCHES: &[&str] = &[
    "--dry-run",
    "--exit-on-error",
    "--sync",
    "--no-sync",
    "--auto-sync",
    "--debug",
];

#[derive(Debug)]
pub enum Task {
    HelpMessage(String),
    Run(ClientConfig),
}

/// The full configuration surface, fixed once at startup
#[derive(Debug)]
pub struct ClientConfig {
    pub moat: Option<String>,
    pub config_dir: String,
    pub input_file: Option<String>,
    pub error_file: Option<String>,
    pub output_file: Option<String>,
    /// max dispatched statements; 0 is unbounded
    pub limit: u64,
    /// recognized statements to skip
    pub offset: u64,
    pub dry_run: bool,
    pub exit_on_error: bool,
    pub sync: SyncMode,
    pub debug: bool,
}

pub fn parse() -> CliResult<Task> {
    let args = match libmoat::scan_cli_args(SWITCHES)? {
        CliAction::Help => return Ok(Task::HelpMessage(TXT_HELP.into())),
        CliAction::Version => return Ok(Task::HelpMessage(libmoat::version_msg("moatsh"))),
        CliAction::Run(args) => args,
    };
    build(args).map(Task::Run)
}

fn build(mut args: CliArgs) -> CliResult<ClientConfig> {
    let config_dir = args
        .options
        .remove("--config-dir")
        .unwrap_or_else(|| config::DEFAULT_CONFIG_DIR.to_owned());
    let input_file = args.options.remove("--input-file");
    let error_file = args.options.remove("--error-file");
    let output_file = args.options.remove("--output-file");
    let limit = parse_count(args.options.remove("--limit"), "--limit")?;
    let offset = parse_count(args.options.remove("--offset"), "--offset")?;
    if !args.options.is_empty() {
        return Err(CliError::ArgsErr(format!(
            "found unknown arguments: {}",
            args.options.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }
    let mut positional = args.positional.drain(..);
    let moat = positional.next();
    if positional.next().is_some() {
        return Err(CliError::ArgsErr(
            "expected at most one moat argument".to_owned(),
        ));
    }
    // --auto-sync always wins; --no-sync beats --sync; default is off
    let sync = if args.switches.contains("--auto-sync") {
        SyncMode::Auto
    } else if args.switches.contains("--no-sync") {
        SyncMode::Off
    } else if args.switches.contains("--sync") {
        SyncMode::On
    } else {
        SyncMode::Off
    };
    Ok(ClientConfig {
        moat,
        config_dir,
        input_file,
        error_file,
        output_file,
        limit,
        offset,
        dry_run: args.switches.contains("--dry-run"),
        exit_on_error: args.switches.contains("--exit-on-error"),
        sync,
        debug: args.switches.contains("--debug"),
    })
}

fn parse_count(value: Option<String>, what: &str) -> CliResult<u64> {
    match value {
        None => Ok(0),
        Some(raw) => raw.parse().map_err(|_| {
            CliError::ArgsErr(format!("bad value for `{what}`. must be a whole number"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::build,
        crate::sync::SyncMode,
        libmoat::CliArgs,
    };

    fn args(options: &[(&str, &str)], switches: &[&str], positional: &[&str]) -> CliArgs {
        CliArgs {
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            switches: switches.iter().map(|s| s.to_string()).collect(),
            positional: positional.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn defaults() {
        let cfg = build(args(&[], &[], &[])).unwrap();
        assert_eq!(cfg.moat, None);
        assert_eq!(cfg.config_dir, "./config");
        assert_eq!((cfg.limit, cfg.offset), (0, 0));
        assert_eq!(cfg.sync, SyncMode::Off);
        assert!(!cfg.dry_run && !cfg.exit_on_error && !cfg.debug);
    }

    #[test]
    fn import_run_configuration() {
        let cfg = build(args(
            &[
                ("--input-file", "dump.sql"),
                ("--error-file", "failures.sql"),
                ("--limit", "500"),
                ("--offset", "100"),
            ],
            &["--exit-on-error"],
            &["prod"],
        ))
        .unwrap();
        assert_eq!(cfg.moat.as_deref(), Some("prod"));
        assert_eq!(cfg.input_file.as_deref(), Some("dump.sql"));
        assert_eq!((cfg.limit, cfg.offset), (500, 100));
        assert!(cfg.exit_on_error);
    }

    #[test]
    fn auto_sync_wins_over_sync_flags() {
        let cfg = build(args(&[], &["--sync", "--auto-sync"], &[])).unwrap();
        assert_eq!(cfg.sync, SyncMode::Auto);
        let cfg = build(args(&[], &["--sync", "--no-sync"], &[])).unwrap();
        assert_eq!(cfg.sync, SyncMode::Off);
        let cfg = build(args(&[], &["--sync"], &[])).unwrap();
        assert_eq!(cfg.sync, SyncMode::On);
    }

    #[test]
    fn bad_counts_and_unknown_options_are_rejected() {
        assert!(build(args(&[("--limit", "many")], &[], &[])).is_err());
        assert!(build(args(&[("--frobnicate", "1")], &[], &[])).is_err());
        assert!(build(args(&[], &[], &["a", "b"])).is_err());
    }
}
