/*
 * Created on Tue Sep 19 2023
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
        args::ClientConfig,
        config::{ConfigDir, MoatProfile},
        connector::{engine_version, fetch_usage, Connector, MoatConnection, Response},
        error::CliResult,
        resp,
        sync::SyncMode,
    },
    crossterm::{cursor, execute, terminal},
    libmoat::util::{
        fmt::{human_readable_data, human_readable_funds},
        terminal as term,
    },
    rustyline::{config::Configurer, error::ReadlineError, DefaultEditor},
    std::{
        fs::File,
        io::{stdout, BufWriter, ErrorKind, Write},
    },
};

const MOATSH_HISTORY_FILE: &str = ".moat_history";
const TXT_WELCOME: &str = include_str!("../help_text/welcome");

pub fn start(cfg: ClientConfig) -> CliResult<()> {
    let dir = ConfigDir::open(&cfg.config_dir)?;
    let init_editor = || {
        let mut editor = DefaultEditor::new()?;
        editor.set_auto_add_history(true);
        editor.set_history_ignore_dups(true)?;
        editor.bind_sequence(
            rustyline::KeyEvent(
                rustyline::KeyCode::BracketedPasteStart,
                rustyline::Modifiers::NONE,
            ),
            rustyline::Cmd::Noop,
        );
        match editor.load_history(MOATSH_HISTORY_FILE) {
            Ok(()) => {}
            Err(e) => match e {
                ReadlineError::Io(ref ioe) => match ioe.kind() {
                    ErrorKind::NotFound => {}
                    _ => return Err(e),
                },
                e => return Err(e),
            },
        }
        rustyline::Result::Ok(editor)
    };
    let mut editor = match init_editor() {
        Ok(e) => e,
        Err(e) => fatal!("error: failed to init shell. {e}"),
    };
    println!(
        "Welcome to the moat shell. moatsh (v{})",
        env!("CARGO_PKG_VERSION")
    );
    println!("Type 'help' or '?' for help.\n");

    let mut session = Session::new(cfg, dir);
    // connecting to an explicitly named moat must succeed up front
    if let Some(moat) = session.cfg.moat.clone() {
        session.connect_by_name(&mut editor, &moat)?;
    }
    session.run(&mut editor)?;
    editor
        .save_history(MOATSH_HISTORY_FILE)
        .expect("failed to save history");
    println!("Bye");
    Ok(())
}

struct Session {
    cfg: ClientConfig,
    dir: ConfigDir,
    con: Option<MoatConnection>,
    profile: Option<MoatProfile>,
    engine: Option<String>,
    sync: SyncMode,
    record: bool,
    output: Option<BufWriter<File>>,
}

impl Session {
    fn new(cfg: ClientConfig, dir: ConfigDir) -> Self {
        Self {
            sync: cfg.sync,
            record: cfg.output_file.is_some(),
            cfg,
            dir,
            con: None,
            profile: None,
            engine: None,
            output: None,
        }
    }

    fn run(&mut self, editor: &mut DefaultEditor) -> CliResult<()> {
        loop {
            let prompt = format!("moat [{}]> ", self.moat_name().unwrap_or("(none)"));
            match editor.readline(&prompt) {
                Ok(line) => match line.trim() {
                    "" => continue,
                    "help" | "?" | "\\?" => self.print_help(),
                    "exit" | "quit" | "\\q" => break,
                    "clear" => clear_screen()?,
                    "debug" | "\\D" => {
                        log::set_max_level(log::LevelFilter::Debug);
                        self.print_debug_state();
                    }
                    "nodebug" | "\\d" => {
                        log::set_max_level(log::LevelFilter::Info);
                        self.print_debug_state();
                    }
                    "record" | "\\O" => {
                        if self.cfg.output_file.is_none() {
                            let _ = term::write_error(
                                "ERROR: no output file configured (use --output-file)\n",
                            );
                        } else {
                            self.record = true;
                            self.print_record_state();
                        }
                    }
                    "norecord" | "\\o" => {
                        self.record = false;
                        self.print_record_state();
                    }
                    "sync" | "\\S" => {
                        self.sync = SyncMode::On;
                        self.print_sync_state();
                    }
                    "nosync" | "\\s" => {
                        self.sync = SyncMode::Off;
                        self.print_sync_state();
                    }
                    "autosync" | "\\a" => {
                        self.sync = SyncMode::Auto;
                        self.print_sync_state();
                    }
                    "info" | "\\i" => self.print_info(),
                    "connect" | "conn" | "\\r" => {
                        if let Err(e) = self.connect_interactive(editor) {
                            let _ = term::write_error(format!("ERROR: {e}\n"));
                        }
                    }
                    sql => self.run_sql(sql),
                },
                Err(e) => match e {
                    ReadlineError::Interrupted | ReadlineError::Eof => break,
                    ReadlineError::WindowResized => {}
                    e => fatal!("error: failed to read line. {e}"),
                },
            }
        }
        Ok(())
    }

    fn moat_name(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.moat.as_str())
    }

    fn print_help(&self) {
        println!("{TXT_WELCOME}");
        println!("options:");
        self.print_record_state();
        self.print_debug_state();
        self.print_sync_state();
        println!();
    }

    fn print_sync_state(&self) {
        let state = match self.sync {
            SyncMode::Auto => "auto",
            SyncMode::On => "on",
            SyncMode::Off => "off",
        };
        println!("  sync   : {state}");
    }

    fn print_debug_state(&self) {
        let state = if log::max_level() >= log::LevelFilter::Debug {
            "on"
        } else {
            "off"
        };
        println!("  debug  : {state}");
    }

    fn print_record_state(&self) {
        println!("  record : {}", if self.record { "on" } else { "off" });
    }

    fn print_info(&mut self) {
        let Some(con) = self.con.as_mut() else {
            let _ = term::write_error("ERROR: moat not connected. Use 'connect'.\n");
            return;
        };
        let usage = match fetch_usage(con) {
            Ok(usage) => usage,
            Err(e) => {
                let _ = term::write_error(format!("ERROR: {e}\n"));
                return;
            }
        };
        if let Some(profile) = self.profile.as_ref() {
            println!("moat:     {}", profile.moat);
            println!("host:     {}", profile.host);
            println!("port:     {}", profile.port());
            println!("protocol: {}", profile.protocol);
            println!(
                "engine:   {}",
                self.engine.as_deref().unwrap_or("(unknown)")
            );
            let _ = term::write_info(format!(
                "moat data usage:  {} / {}\n",
                human_readable_data(usage.data.value),
                human_readable_data(usage.data.total)
            ));
            let _ = term::write_info(format!(
                "moat funds usage: {} / {}\n",
                human_readable_funds(usage.funds.value, "USD"),
                human_readable_funds(usage.funds.total, "USD")
            ));
        }
    }

    fn connect_interactive(&mut self, editor: &mut DefaultEditor) -> CliResult<()> {
        let known = self.dir.list()?;
        if !known.is_empty() {
            println!("configured moats: {}", known.join(", "));
        }
        let moat = editor.readline("moat name: ")?;
        let moat = moat.trim();
        if moat.is_empty() {
            return Ok(());
        }
        self.connect_by_name(editor, moat)
    }

    fn connect_by_name(&mut self, editor: &mut DefaultEditor, moat: &str) -> CliResult<()> {
        let profile = if self.dir.exists(moat) {
            self.dir.load(moat)?
        } else {
            let profile = prompt_new_profile(editor, moat)?;
            self.dir.save(&profile)?;
            profile
        };
        let mut con = MoatConnection::connect(&profile)?;
        // a moat that reports no usage is treated as unreachable
        fetch_usage(&mut con)?;
        self.engine = engine_version(&mut con);
        let _ = term::write_success(format!("connected to moat `{}`\n", profile.moat));
        self.profile = Some(profile);
        self.con = Some(con);
        Ok(())
    }

    fn run_sql(&mut self, sql: &str) {
        // statements always end with ";"
        if !sql.ends_with(';') {
            let _ = term::write_error("ERROR: SQL statements must end in ';'\n");
            return;
        }
        let sync = self.sync.decide(sql);
        if self.sync == SyncMode::Auto {
            println!("^ sync: {sync}");
        }
        let resp = match self.con.as_mut() {
            Some(con) => con.query(sql, sync),
            None => {
                let _ = term::write_error("ERROR: moat not connected. Use 'connect'.\n");
                return;
            }
        };
        match resp {
            Ok(resp) => {
                resp::format_response(&resp);
                if self.record {
                    self.record_rows(&resp);
                }
            }
            Err(e) => resp::format_error(e),
        }
    }

    /// Append row payloads to the configured output file, opened (and
    /// truncated) on first use in this session
    fn record_rows(&mut self, resp: &Response) {
        let Response::Rows(rows) = resp else { return };
        if self.output.is_none() {
            let Some(path) = self.cfg.output_file.as_deref() else {
                return;
            };
            match File::create(path) {
                Ok(f) => self.output = Some(BufWriter::new(f)),
                Err(e) => {
                    let _ =
                        term::write_error(format!("ERROR: failed to open output file. {e}\n"));
                    return;
                }
            }
        }
        if let Some(out) = self.output.as_mut() {
            let written = serde_json::to_string(rows)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                .and_then(|line| writeln!(out, "{line}").and_then(|_| out.flush()));
            if let Err(e) = written {
                let _ = term::write_error(format!("ERROR: failed to write output file. {e}\n"));
            }
        }
    }
}

fn prompt_new_profile(editor: &mut DefaultEditor, moat: &str) -> CliResult<MoatProfile> {
    println!("no profile for `{moat}`, creating one");
    let host = prompt_default(editor, "moat host", "test-db.moat.xyz")?;
    let port = loop {
        let raw = editor.readline("moat port (blank for default): ")?;
        let raw = raw.trim();
        if raw.is_empty() {
            break None;
        }
        match raw.parse::<u16>() {
            Ok(port) => break Some(port),
            Err(_) => println!("port must be an integer in the range 0-65535"),
        }
    };
    let protocol = prompt_default(editor, "moat protocol", "tcp")?;
    let secret = prompt_required(editor, "moat secret")?;
    let private_key = loop {
        let raw = prompt_required(editor, "moat private key (JSON)")?;
        match serde_json::from_str(&raw) {
            Ok(key) => break key,
            Err(_) => println!("private key is not valid JSON"),
        }
    };
    Ok(MoatProfile {
        moat: moat.to_owned(),
        host,
        port,
        protocol,
        secret,
        private_key,
    })
}

fn prompt_default(editor: &mut DefaultEditor, what: &str, default: &str) -> CliResult<String> {
    let raw = editor.readline(&format!("{what} [{default}]: "))?;
    let raw = raw.trim();
    Ok(if raw.is_empty() {
        default.to_owned()
    } else {
        raw.to_owned()
    })
}

fn prompt_required(editor: &mut DefaultEditor, what: &str) -> CliResult<String> {
    loop {
        let raw = editor.readline(&format!("{what}: "))?;
        let raw = raw.trim();
        if !raw.is_empty() {
            return Ok(raw.to_owned());
        }
        println!("{what} is required");
    }
}

fn clear_screen() -> std::io::Result<()> {
    let mut stdout = stdout();
    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
    execute!(stdout, cursor::MoveTo(0, 0))
}
