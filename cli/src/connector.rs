/*
 * Created on Fri Sep 15 2023
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
        config::MoatProfile,
        error::{CliError, CliResult},
    },
    serde::{Deserialize, Serialize},
    std::{
        io::{BufRead, BufReader, Write},
        net::TcpStream,
    },
};

/// Conversion rate between raw debit figures and funds; owned by the moat
/// service, mirrored here so the client can render the same gauges as the
/// service dashboard
const FUNDS_RATE: f64 = 8.5 * 1.3;
const NANO: f64 = 1_000_000_000.0;

/// A successful statement execution
#[derive(Debug, PartialEq)]
pub enum Response {
    /// the statement returned row data
    Rows(Vec<serde_json::Value>),
    /// the statement returned nothing
    Empty,
}

/// The capability the import driver and the shell run against. Any failure
/// is surfaced as a uniform `CliError::ConnectorError` before inspection.
pub trait Connector {
    fn query(&mut self, statement: &str, sync: bool) -> CliResult<Response>;
    /// raw funding figure, if the moat host reports one
    fn funding(&mut self) -> CliResult<Option<f64>>;
    /// raw debit figure, if the moat host reports one
    fn debit(&mut self) -> CliResult<Option<f64>>;
}

/// One usage gauge: how much of `total` is used up by `value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gauge {
    pub total: f64,
    pub value: f64,
}

/// Funds and data usage of the connected moat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub funds: Gauge,
    pub data: Gauge,
}

/// Query both usage figures and derive the gauges. Fails as a unit: if
/// either figure is unavailable, no partial usage is returned and whatever
/// the caller held on to stays valid.
pub fn fetch_usage<C: Connector + ?Sized>(con: &mut C) -> CliResult<Usage> {
    let funding = con.funding()?;
    let debit = con.debit()?;
    match (funding, debit) {
        (Some(funding), Some(debit)) => Ok(Usage {
            funds: Gauge {
                total: funding,
                value: (debit / NANO) * FUNDS_RATE,
            },
            data: Gauge {
                total: ((funding / FUNDS_RATE) * NANO).round(),
                value: debit,
            },
        }),
        _ => Err(CliError::ConnectorError(
            "moat host did not report funding/debit figures".to_owned(),
        )),
    }
}

/// Best-effort engine banner of the connected moat. The version query is not
/// engine agnostic, so failures simply yield `None`.
pub fn engine_version<C: Connector + ?Sized>(con: &mut C) -> Option<String> {
    match con.query("SELECT VERSION();", false) {
        Ok(Response::Rows(rows)) => rows
            .first()
            .and_then(|row| row.get("version"))
            .and_then(|v| v.as_str())
            .map(|v| {
                v.split_whitespace()
                    .take(2)
                    .collect::<Vec<&str>>()
                    .join(" ")
            }),
        _ => None,
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Hello {
        moat: &'a str,
        secret: &'a str,
        key: &'a serde_json::Value,
    },
    Query {
        statement: &'a str,
        sync: bool,
    },
    Funding,
    Debit,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    rows: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    value: Option<f64>,
}

/// A connection to a moat host, speaking the line-oriented JSON protocol:
/// one request object per line out, one reply object per line back
pub struct MoatConnection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl MoatConnection {
    /// Connect and authenticate against the moat named by the profile
    pub fn connect(profile: &MoatProfile) -> CliResult<Self> {
        let stream = TcpStream::connect((profile.host.as_str(), profile.port()))
            .map_err(|e| CliError::ConnectorError(format!("failed to reach moat host. {e}")))?;
        let reader = BufReader::new(
            stream
                .try_clone()
                .map_err(|e| CliError::ConnectorError(format!("failed to split stream. {e}")))?,
        );
        let mut con = Self { stream, reader };
        let reply = con.roundtrip(&Request::Hello {
            moat: &profile.moat,
            secret: &profile.secret,
            key: &profile.private_key,
        })?;
        if reply.ok {
            Ok(con)
        } else {
            Err(CliError::ConnectorError(
                reply
                    .error
                    .unwrap_or_else(|| "moat host rejected the connection".to_owned()),
            ))
        }
    }
    fn roundtrip(&mut self, request: &Request) -> CliResult<Reply> {
        let mut wire = serde_json::to_vec(request)
            .map_err(|e| CliError::ConnectorError(format!("failed to encode request. {e}")))?;
        wire.push(b'\n');
        self.stream
            .write_all(&wire)
            .map_err(|e| CliError::ConnectorError(format!("send failed. {e}")))?;
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| CliError::ConnectorError(format!("receive failed. {e}")))?;
        if read == 0 {
            return Err(CliError::ConnectorError(
                "moat host closed the connection".to_owned(),
            ));
        }
        debug!("moat reply: {}", line.trim_end());
        serde_json::from_str(&line)
            .map_err(|e| CliError::ConnectorError(format!("invalid reply from moat host. {e}")))
    }
    fn expect_no_error(reply: Reply) -> CliResult<Reply> {
        match reply.error {
            Some(e) => Err(CliError::ConnectorError(e)),
            None => Ok(reply),
        }
    }
}

impl Connector for MoatConnection {
    fn query(&mut self, statement: &str, sync: bool) -> CliResult<Response> {
        let reply = Self::expect_no_error(self.roundtrip(&Request::Query { statement, sync })?)?;
        match reply.rows {
            Some(rows) => Ok(Response::Rows(rows)),
            None => Ok(Response::Empty),
        }
    }
    fn funding(&mut self) -> CliResult<Option<f64>> {
        let reply = Self::expect_no_error(self.roundtrip(&Request::Funding)?)?;
        Ok(reply.value)
    }
    fn debit(&mut self) -> CliResult<Option<f64>> {
        let reply = Self::expect_no_error(self.roundtrip(&Request::Debit)?)?;
        Ok(reply.value)
    }
}

#[cfg(test)]
mod tests {
    use super::{fetch_usage, Connector, Response};
    use crate::error::{CliError, CliResult};

    struct FixedFigures {
        funding: Option<f64>,
        debit: Option<f64>,
    }

    impl Connector for FixedFigures {
        fn query(&mut self, _statement: &str, _sync: bool) -> CliResult<Response> {
            Ok(Response::Empty)
        }
        fn funding(&mut self) -> CliResult<Option<f64>> {
            Ok(self.funding)
        }
        fn debit(&mut self) -> CliResult<Option<f64>> {
            Ok(self.debit)
        }
    }

    #[test]
    fn usage_gauges_follow_the_service_conversion() {
        let mut con = FixedFigures {
            funding: Some(50.0),
            debit: Some(2_000_000_000.0),
        };
        let usage = fetch_usage(&mut con).unwrap();
        assert_eq!(usage.funds.total, 50.0);
        assert_eq!(usage.funds.value, 2.0 * 8.5 * 1.3);
        assert_eq!(usage.data.value, 2_000_000_000.0);
        assert_eq!(usage.data.total, ((50.0_f64 / (8.5 * 1.3)) * 1e9).round());
    }

    #[test]
    fn usage_fails_as_a_unit_when_a_figure_is_missing() {
        let mut con = FixedFigures {
            funding: Some(50.0),
            debit: None,
        };
        match fetch_usage(&mut con) {
            Err(CliError::ConnectorError(_)) => {}
            other => panic!("expected a connector error, got {other:?}"),
        }
    }
}
