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

use regex::Regex;

lazy_static::lazy_static! {
    // leading keywords of statements that never need a synced write
    static ref RE_READ_ONLY: Regex =
        Regex::new(r"(?i)^(ANALYZE|DESCRIBE|EXPLAIN|SELECT|SHOW)").unwrap();
}

/// How the per-statement sync flag is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// never sync
    Off,
    /// always sync
    On,
    /// sync writes, don't sync reads
    Auto,
}

impl SyncMode {
    /// Decide the sync flag for one statement. Pure; the statement text is
    /// only inspected for its leading keyword.
    pub fn decide(self, statement: &str) -> bool {
        match self {
            SyncMode::Off => false,
            SyncMode::On => true,
            SyncMode::Auto => !RE_READ_ONLY.is_match(statement.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SyncMode;

    #[test]
    fn fixed_modes_ignore_the_statement() {
        assert!(!SyncMode::Off.decide("insert into t values (1);"));
        assert!(SyncMode::On.decide("select * from t;"));
    }

    #[test]
    fn auto_mode_reads_do_not_sync() {
        assert!(!SyncMode::Auto.decide("select * from t;"));
        assert!(!SyncMode::Auto.decide("  SHOW TABLES;"));
        assert!(!SyncMode::Auto.decide("Explain select 1;"));
    }

    #[test]
    fn auto_mode_writes_sync() {
        assert!(SyncMode::Auto.decide("insert into t values (1);"));
        assert!(SyncMode::Auto.decide("DROP TABLE t;"));
        assert!(SyncMode::Auto.decide("update t set a = 1;"));
    }

    #[test]
    fn auto_mode_keyword_match_is_case_insensitive() {
        assert!(!SyncMode::Auto.decide("sElEcT 1;"));
        assert!(!SyncMode::Auto.decide("describe t;"));
    }
}
