/*
 * Created on Wed Sep 13 2023
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

use core::fmt;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    /// bad command-line arguments
    ArgsErr(String),
    /// bad or missing configuration (for example, an import without a moat)
    ConfigError(String),
    /// the moat connector reported a failure
    ConnectorError(String),
    /// the input SQL source could not be opened or read
    SourceError(String, std::io::Error),
    /// the error/output sink could not be opened or written
    SinkError(String, std::io::Error),
    /// any other i/o error
    IoError(std::io::Error),
}

impl From<libmoat::ArgScanError> for CliError {
    fn from(e: libmoat::ArgScanError) -> Self {
        match e {
            libmoat::ArgScanError::Duplicate(d) => {
                Self::ArgsErr(format!("duplicate value for `{d}`"))
            }
            libmoat::ArgScanError::MissingValue(m) => {
                Self::ArgsErr(format!("missing value for `{m}`"))
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(ioe: std::io::Error) -> Self {
        Self::IoError(ioe)
    }
}

impl From<rustyline::error::ReadlineError> for CliError {
    fn from(rle: rustyline::error::ReadlineError) -> Self {
        match rle {
            rustyline::error::ReadlineError::Io(ioe) => Self::IoError(ioe),
            e => Self::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgsErr(e) => write!(f, "incorrect arguments. {e}"),
            Self::ConfigError(e) => write!(f, "configuration error. {e}"),
            Self::ConnectorError(e) => write!(f, "moat error. {e}"),
            Self::SourceError(path, e) => write!(f, "failed to read `{path}`. {e}"),
            Self::SinkError(path, e) => write!(f, "failed to write `{path}`. {e}"),
            Self::IoError(e) => write!(f, "i/o error. {e}"),
        }
    }
}
