/*
 * Created on Sat Sep 16 2023
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
    crate::connector::Usage,
    libmoat::util::{
        fmt::{human_readable_data, human_readable_funds},
        terminal,
    },
};

/// The sink that the import driver pushes counter and usage updates into.
/// Updates per counter are monotonically non-decreasing within one pass and
/// `finish` is called exactly once at pass end. Rendering is up to the
/// implementation; the driver never cares.
pub trait ProgressReport {
    fn begin(&mut self, usage: Option<&Usage>, sql_total: Option<u64>);
    fn update_sql(&mut self, current: u64);
    fn update_data(&mut self, value: f64);
    fn update_funds(&mut self, value: f64);
    fn finish(&mut self);
}

/// Line-oriented console rendering. SQL progress lines are only printed on
/// usage refresh boundaries and at pass end to keep long imports readable.
pub struct ConsoleReport {
    sql_total: Option<u64>,
    data_total: Option<f64>,
    funds_total: Option<f64>,
    current: u64,
}

impl ConsoleReport {
    pub fn new() -> Self {
        Self {
            sql_total: None,
            data_total: None,
            funds_total: None,
            current: 0,
        }
    }
    fn print_sql_line(&self) {
        if let Some(total) = self.sql_total {
            let _ = terminal::write_info(format!("sql statements: {} / {total}\n", self.current));
        }
    }
}

impl ProgressReport for ConsoleReport {
    fn begin(&mut self, usage: Option<&Usage>, sql_total: Option<u64>) {
        self.sql_total = sql_total;
        if let Some(usage) = usage {
            self.data_total = Some(usage.data.total);
            self.funds_total = Some(usage.funds.total);
            self.update_data(usage.data.value);
            self.update_funds(usage.funds.value);
        }
        self.print_sql_line();
    }
    fn update_sql(&mut self, current: u64) {
        self.current = current;
    }
    fn update_data(&mut self, value: f64) {
        let total = self.data_total.map(human_readable_data);
        let _ = terminal::write_info(format!(
            "moat data usage:  {} / {}\n",
            human_readable_data(value),
            total.as_deref().unwrap_or("?")
        ));
        self.print_sql_line();
    }
    fn update_funds(&mut self, value: f64) {
        let total = self.funds_total.map(|t| human_readable_funds(t, "USD"));
        let _ = terminal::write_info(format!(
            "moat funds usage: {} / {}\n",
            human_readable_funds(value, "USD"),
            total.as_deref().unwrap_or("?")
        ));
    }
    fn finish(&mut self) {
        self.print_sql_line();
        let _ = terminal::write_success("import pass complete\n");
    }
}
