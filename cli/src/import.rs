/*
 * Created on Sun Sep 17 2023
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

//! The batch SQL import pipeline
//!
//! Two full scans over the source: the first only counts statements so the
//! progress sink can be sized up front, the second executes. Both scans run
//! the same lexer and windowing logic, so their counts agree for a static
//! source. Statements execute strictly one at a time, in source order.

use {
    crate::{
        connector::{fetch_usage, Connector, Response, Usage},
        error::{CliError, CliResult},
        lexer::{Statement, Statements},
        progress::ProgressReport,
        sync::SyncMode,
    },
    std::{
        fs::File,
        io::{self, BufRead, BufReader, BufWriter, Write},
        thread,
        time::Duration,
    },
};

/// while importing, refresh moat funds/data usage after this many processed
/// statements
pub const REFRESH_USAGE_CYCLE: u64 = 100;
const DRY_RUN_DELAY: Duration = Duration::from_millis(10);

/// Which recognized statements actually get dispatched
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowPolicy {
    /// recognized statements to skip before dispatching starts
    pub offset: u64,
    /// dispatched statements after which the pass halts; 0 is unbounded
    pub limit: u64,
}

impl WindowPolicy {
    pub fn admits(&self, ordinal: u64) -> bool {
        ordinal > self.offset
    }
    pub fn exhausted(&self, processed: u64) -> bool {
        self.limit > 0 && processed >= self.limit
    }
}

/// Running counters for one pass over the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// statements encountered (terminator seen)
    pub total: u64,
    /// statements dispatched (past the offset, under the limit)
    pub processed: u64,
    /// dispatched statements that failed
    pub errored: u64,
    /// ordinal of the statement being processed
    pub current: u64,
}

impl SessionStats {
    fn consistent(&self) -> bool {
        self.errored <= self.processed && self.processed <= self.total
    }
}

/// Everything one import run needs, fixed at startup
#[derive(Debug)]
pub struct ImportConfig {
    pub input_file: String,
    pub error_file: Option<String>,
    pub output_file: Option<String>,
    pub window: WindowPolicy,
    pub sync: SyncMode,
    pub dry_run: bool,
    pub exit_on_error: bool,
}

/// Walk the statement stream, counting every recognized statement and
/// dispatching the admitted ones. Stops pulling lines the moment the limit
/// is reached.
fn scan<R, F>(
    source: R,
    window: &WindowPolicy,
    stats: &mut SessionStats,
    mut dispatch: F,
) -> CliResult<()>
where
    R: BufRead,
    F: FnMut(&str, u64, &mut SessionStats) -> CliResult<()>,
{
    for statement in Statements::new(source) {
        let Statement { text, ordinal } = statement?;
        stats.total = ordinal;
        stats.current = ordinal;
        if window.admits(ordinal) {
            stats.processed += 1;
            dispatch(&text, ordinal, stats)?;
        }
        debug_assert!(stats.consistent());
        if window.exhausted(stats.processed) {
            break;
        }
    }
    Ok(())
}

/// A truncate-at-open, newline-delimited file sink
struct Sink {
    path: String,
    writer: BufWriter<File>,
}

impl Sink {
    fn open(path: &str) -> CliResult<Self> {
        let file =
            File::create(path).map_err(|e| CliError::SinkError(path.to_owned(), e))?;
        Ok(Self {
            path: path.to_owned(),
            writer: BufWriter::new(file),
        })
    }
    fn write_line(&mut self, line: &str) -> CliResult<()> {
        writeln!(self.writer, "{line}").map_err(|e| CliError::SinkError(self.path.clone(), e))
    }
    fn close(&mut self) -> CliResult<()> {
        self.writer
            .flush()
            .map_err(|e| CliError::SinkError(self.path.clone(), e))
    }
}

/// Run a full import over the configured input file
pub fn run_import<C: Connector + ?Sized>(
    con: &mut C,
    cfg: &ImportConfig,
    usage: Option<&Usage>,
    progress: &mut dyn ProgressReport,
) -> CliResult<SessionStats> {
    import_with(con, cfg, usage, progress, || {
        File::open(&cfg.input_file)
            .map(BufReader::new)
            .map_err(|e| CliError::SourceError(cfg.input_file.clone(), e))
    })
}

/// The two-pass protocol over an arbitrary re-openable source. The `source`
/// factory is called once per pass.
fn import_with<C, R, F>(
    con: &mut C,
    cfg: &ImportConfig,
    usage: Option<&Usage>,
    progress: &mut dyn ProgressReport,
    mut source: F,
) -> CliResult<SessionStats>
where
    C: Connector + ?Sized,
    R: BufRead,
    F: FnMut() -> CliResult<R>,
{
    // sinks open (truncating) before any statement runs; failure aborts here
    let mut error_sink = cfg.error_file.as_deref().map(Sink::open).transpose()?;
    let mut output_sink = cfg.output_file.as_deref().map(Sink::open).transpose()?;

    // pass 1: count statements to size the progress report
    let mut counted = SessionStats::default();
    scan(source()?, &cfg.window, &mut counted, |_, _, _| Ok(()))?;
    progress.begin(usage, Some(counted.total));

    // pass 2: execute
    let mut stats = SessionStats::default();
    let result = execute_pass(
        con,
        cfg,
        counted.total,
        progress,
        source()?,
        error_sink.as_mut(),
        output_sink.as_mut(),
        &mut stats,
    );

    // flush-and-close holds on the fatal path too
    for sink in [error_sink.as_mut(), output_sink.as_mut()]
        .into_iter()
        .flatten()
    {
        sink.close()?;
    }
    progress.finish();
    result?;

    debug!(
        "number of statements error/processed/total = {}/{}/{}",
        stats.errored, stats.processed, stats.total
    );
    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
fn execute_pass<C, R>(
    con: &mut C,
    cfg: &ImportConfig,
    pass_total: u64,
    progress: &mut dyn ProgressReport,
    source: R,
    mut error_sink: Option<&mut Sink>,
    mut output_sink: Option<&mut Sink>,
    stats: &mut SessionStats,
) -> CliResult<()>
where
    C: Connector + ?Sized,
    R: BufRead,
{
    scan(source, &cfg.window, stats, |statement, ordinal, stats| {
        if cfg.dry_run {
            // trial run: keep the control flow, skip the moat
            thread::sleep(DRY_RUN_DELAY);
        } else {
            match con.query(statement, cfg.sync.decide(statement)) {
                Ok(Response::Rows(rows)) => {
                    if let Some(sink) = output_sink.as_mut() {
                        let line = serde_json::to_string(&rows).map_err(|e| {
                            CliError::SinkError(
                                sink.path.clone(),
                                io::Error::new(io::ErrorKind::InvalidData, e),
                            )
                        })?;
                        sink.write_line(&line)?;
                    }
                }
                Ok(Response::Empty) => {}
                Err(e) => {
                    stats.errored += 1;
                    if let Some(sink) = error_sink.as_mut() {
                        sink.write_line(statement)?;
                    }
                    if cfg.exit_on_error {
                        return Err(e);
                    }
                    debug!("sql error at statement {ordinal}: {e}");
                }
            }
        }
        progress.update_sql(ordinal);
        let last_of_pass = ordinal == pass_total || cfg.window.exhausted(stats.processed);
        if stats.processed % REFRESH_USAGE_CYCLE == 0 || last_of_pass {
            match fetch_usage(con) {
                Ok(usage) => {
                    progress.update_data(usage.data.value);
                    progress.update_funds(usage.funds.value);
                }
                // prior usage figures stay as they are
                Err(e) => warn!("usage refresh failed: {e}"),
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use {
        super::{
            execute_pass, import_with, scan, ImportConfig, SessionStats, Sink, WindowPolicy,
        },
        crate::{
            connector::{Connector, Response, Usage},
            error::{CliError, CliResult},
            progress::ProgressReport,
            sync::SyncMode,
        },
        std::{
            cell::Cell,
            io::{self, BufRead, Cursor, Read},
            rc::Rc,
        },
    };

    /// Fails statements containing "boom", returns a row for statements
    /// containing "rows", counts every call
    #[derive(Default)]
    struct MockMoat {
        query_calls: u64,
        refreshes: u64,
    }

    impl Connector for MockMoat {
        fn query(&mut self, statement: &str, _sync: bool) -> CliResult<Response> {
            self.query_calls += 1;
            if statement.contains("boom") {
                Err(CliError::ConnectorError("boom".to_owned()))
            } else if statement.contains("rows") {
                Ok(Response::Rows(vec![serde_json::json!({"a": 1})]))
            } else {
                Ok(Response::Empty)
            }
        }
        fn funding(&mut self) -> CliResult<Option<f64>> {
            self.refreshes += 1;
            Ok(Some(100.0))
        }
        fn debit(&mut self) -> CliResult<Option<f64>> {
            Ok(Some(1_000_000_000.0))
        }
    }

    #[derive(Default)]
    struct Recorder {
        total: Option<u64>,
        sql: Vec<u64>,
        data: Vec<f64>,
        funds: Vec<f64>,
        finished: u32,
    }

    impl ProgressReport for Recorder {
        fn begin(&mut self, _usage: Option<&Usage>, sql_total: Option<u64>) {
            self.total = sql_total;
        }
        fn update_sql(&mut self, current: u64) {
            self.sql.push(current);
        }
        fn update_data(&mut self, value: f64) {
            self.data.push(value);
        }
        fn update_funds(&mut self, value: f64) {
            self.funds.push(value);
        }
        fn finish(&mut self) {
            self.finished += 1;
        }
    }

    /// Hands out one source line per `fill_buf` so tests can observe exactly
    /// how far a pass read
    struct LineFeed {
        lines: Vec<String>,
        at: usize,
        chunk: Vec<u8>,
        fed: Rc<Cell<usize>>,
    }

    impl LineFeed {
        fn new(lines: &[&str], fed: Rc<Cell<usize>>) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                at: 0,
                chunk: Vec::new(),
                fed,
            }
        }
    }

    impl Read for LineFeed {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let chunk = self.fill_buf()?;
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            self.consume(n);
            Ok(n)
        }
    }

    impl BufRead for LineFeed {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            if self.chunk.is_empty() && self.at < self.lines.len() {
                self.chunk = format!("{}\n", self.lines[self.at]).into_bytes();
                self.at += 1;
                self.fed.set(self.fed.get() + 1);
            }
            Ok(&self.chunk)
        }
        fn consume(&mut self, amt: usize) {
            self.chunk.drain(..amt);
        }
    }

    fn cfg(window: WindowPolicy) -> ImportConfig {
        ImportConfig {
            input_file: String::new(),
            error_file: None,
            output_file: None,
            window,
            sync: SyncMode::Off,
            dry_run: false,
            exit_on_error: false,
        }
    }

    fn statements(n: usize) -> String {
        (1..=n)
            .map(|i| format!("select {i};\n"))
            .collect::<String>()
    }

    fn run(source: &str, config: &ImportConfig) -> (MockMoat, Recorder, SessionStats) {
        let mut con = MockMoat::default();
        let mut progress = Recorder::default();
        let owned = source.to_owned();
        let stats = import_with(&mut con, config, None, &mut progress, || {
            Ok(Cursor::new(owned.clone()))
        })
        .unwrap();
        (con, progress, stats)
    }

    #[test]
    fn counters_stay_consistent_under_partial_failure() {
        let src = "select 1;\nboom 1;\nselect 2;\nboom 2;\nselect 3;\n";
        let (con, progress, stats) = run(src, &cfg(WindowPolicy::default()));
        assert_eq!(stats.total, 5);
        assert_eq!(stats.processed, 5);
        assert_eq!(stats.errored, 2);
        assert!(stats.errored <= stats.processed && stats.processed <= stats.total);
        assert_eq!(con.query_calls, 5);
        assert_eq!(progress.total, Some(5));
        assert_eq!(progress.finished, 1);
    }

    #[test]
    fn offset_skips_statements_without_dispatch() {
        let (con, progress, stats) = run(
            &statements(5),
            &cfg(WindowPolicy {
                offset: 2,
                limit: 0,
            }),
        );
        assert_eq!(stats.total, 5);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.current, 5);
        assert_eq!(con.query_calls, 3);
        // the skipped ordinals never reach the progress sink
        assert_eq!(progress.sql, vec![3, 4, 5]);
    }

    #[test]
    fn limit_dispatches_exactly_m_statements() {
        let (con, _, stats) = run(
            &statements(10),
            &cfg(WindowPolicy {
                offset: 1,
                limit: 4,
            }),
        );
        assert_eq!(stats.processed, 4);
        assert_eq!(stats.total, 5); // scanning stopped right after the 4th dispatch
        assert_eq!(con.query_calls, 4);
    }

    #[test]
    fn limit_stops_pulling_lines_immediately() {
        let fed = Rc::new(Cell::new(0));
        let lines: Vec<String> = (1..=10).map(|i| format!("select {i};")).collect();
        let refs: Vec<&str> = lines.iter().map(|l| l.as_str()).collect();
        let feed = LineFeed::new(&refs, fed.clone());
        let mut stats = SessionStats::default();
        let window = WindowPolicy {
            offset: 0,
            limit: 3,
        };
        scan(feed, &window, &mut stats, |_, _, _| Ok(())).unwrap();
        assert_eq!(stats.processed, 3);
        assert_eq!(fed.get(), 3);
    }

    #[test]
    fn two_pass_totals_agree() {
        let src = "-- header\nselect 1;\nselect\n2;\n\nselect 3;\n";
        let (_, progress, stats) = run(src, &cfg(WindowPolicy::default()));
        assert_eq!(progress.total, Some(stats.total));
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn exit_on_error_halts_the_pass() {
        let fed = Rc::new(Cell::new(0));
        let lines = ["select 1;", "boom;", "select 2;", "select 3;", "select 4;"];
        let feed = LineFeed::new(&lines, fed.clone());
        let mut con = MockMoat::default();
        let mut progress = Recorder::default();
        let mut config = cfg(WindowPolicy::default());
        config.exit_on_error = true;
        let mut stats = SessionStats::default();
        let ret = execute_pass(
            &mut con,
            &config,
            5,
            &mut progress,
            feed,
            None,
            None,
            &mut stats,
        );
        assert!(matches!(ret, Err(CliError::ConnectorError(_))));
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.errored, 1);
        // the remaining statements were never read from the source
        assert_eq!(fed.get(), 2);
        assert_eq!(con.query_calls, 2);
    }

    #[test]
    fn dry_run_never_touches_the_moat_queries() {
        let src = "boom 1;\nboom 2;\nselect 1;\n";
        let mut config = cfg(WindowPolicy::default());
        config.dry_run = true;
        let (con, _, stats) = run(src, &config);
        assert_eq!(con.query_calls, 0);
        assert_eq!(stats.errored, 0);
        assert_eq!(stats.processed, 3);
    }

    #[test]
    fn usage_refresh_cadence() {
        let (con, progress, _) = run(&statements(250), &cfg(WindowPolicy::default()));
        // refreshes at 100, 200 and once more on the final statement
        assert_eq!(con.refreshes, 3);
        assert_eq!(progress.data.len(), 3);
        assert_eq!(progress.funds.len(), 3);
    }

    #[test]
    fn usage_refresh_on_final_statement_only_for_short_passes() {
        let (con, _, _) = run(&statements(7), &cfg(WindowPolicy::default()));
        assert_eq!(con.refreshes, 1);
    }

    #[test]
    fn sinks_are_truncated_and_filled() {
        let dir = std::env::temp_dir();
        let errors = dir.join(format!("moatsh-test-{}.err", std::process::id()));
        let output = dir.join(format!("moatsh-test-{}.out", std::process::id()));
        std::fs::write(&errors, "stale\n").unwrap();
        std::fs::write(&output, "stale\n").unwrap();

        let mut config = cfg(WindowPolicy::default());
        config.error_file = Some(errors.display().to_string());
        config.output_file = Some(output.display().to_string());
        let src = "rows please;\nboom;\nselect 1;\n";
        let (_, _, stats) = run(src, &config);
        assert_eq!(stats.errored, 1);

        let errors_written = std::fs::read_to_string(&errors).unwrap();
        let output_written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(errors_written, "boom;\n");
        assert_eq!(output_written, "[{\"a\":1}]\n");

        let _ = std::fs::remove_file(&errors);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn sink_open_failure_aborts_before_any_statement() {
        let mut config = cfg(WindowPolicy::default());
        config.error_file = Some("/definitely/not/a/dir/x.err".to_owned());
        let mut con = MockMoat::default();
        let mut progress = Recorder::default();
        let ret = import_with(&mut con, &config, None, &mut progress, || {
            Ok(Cursor::new(statements(3)))
        });
        assert!(matches!(ret, Err(CliError::SinkError(_, _))));
        assert_eq!(con.query_calls, 0);
    }

    #[test]
    fn sink_writes_one_line_per_statement() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("moatsh-test-{}.lines", std::process::id()));
        {
            let mut sink = Sink::open(&path.display().to_string()).unwrap();
            sink.write_line("a;").unwrap();
            sink.write_line("b;").unwrap();
            sink.close().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a;\nb;\n");
        let _ = std::fs::remove_file(&path);
    }
}
