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

pub mod terminal {
    //! Utilities for Terminal I/O
    use std::fmt;
    use std::io::Write;
    use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
    /// Write to stdout with the given foreground color
    pub fn write_with_col<T: fmt::Display>(item: T, color: Option<Color>) -> fmt::Result {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        if stdout.set_color(ColorSpec::new().set_fg(color)).is_err() {
            return Err(fmt::Error);
        }
        if write!(&mut stdout, "{}", item).is_err() {
            return Err(fmt::Error);
        }
        if stdout.reset().is_err() {
            return Err(fmt::Error);
        }
        Ok(())
    }
    pub fn write_info<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Cyan))
    }
    pub fn write_warning<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Yellow))
    }
    pub fn write_error<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Red))
    }
    pub fn write_success<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Green))
    }
}

pub mod fmt {
    //! Human readable renderings of the moat usage gauges

    /// Round to two decimal places, always rendering both
    pub fn round2(v: f64) -> String {
        format!("{:.2}", (v * 100.0).round() / 100.0)
    }

    /// Funds below a cent are floored to `< 0.01`
    pub fn human_readable_funds(v: f64, currency: &str) -> String {
        if v < 0.01 {
            format!("< 0.01 {currency}")
        } else {
            format!("{} {currency}", round2(v))
        }
    }

    /// Byte counts scaled to KB/MB/GB
    pub fn human_readable_data(v: f64) -> String {
        if v > 1_000_000_000.0 {
            format!("{} GB", round2(v / 1_000_000_000.0))
        } else if v > 1_000_000.0 {
            format!("{} MB", round2(v / 1_000_000.0))
        } else if v > 1_000.0 {
            format!("{} KB", round2(v / 1_000.0))
        } else {
            round2(v)
        }
    }

}
