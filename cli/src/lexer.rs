/*
 * Created on Thu Sep 14 2023
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

//! Line-oriented segmentation of an SQL source into statements
//!
//! Statements are terminated by a `;` at end-of-line; blank lines and `--`
//! comment lines are skipped; everything else is accumulated verbatim. The
//! lexer does not interpret quoting, so a `;` ending a line inside a string
//! literal is misread as a terminator. This mirrors the import file format
//! and is a documented limitation, not a bug to fix here.

use {
    regex::Regex,
    std::{
        io::{self, BufRead, Lines},
        mem,
    },
};

lazy_static::lazy_static! {
    // empty lines and comments
    static ref RE_LINE_SKIP: Regex = Regex::new(r"^(\s*$|--)").unwrap();
    // statements always end with ";"
    static ref RE_STATEMENT_END: Regex = Regex::new(r";$").unwrap();
}

/// One reconstructed statement and its 1-based ordinal in the source
#[derive(Debug, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub ordinal: u64,
}

/// A lazy, forward-only stream of statements over a line source. Consuming
/// it twice requires re-opening the source.
pub struct Statements<R> {
    lines: Lines<R>,
    partial: String,
    emitted: u64,
}

impl<R: BufRead> Statements<R> {
    pub fn new(source: R) -> Self {
        Self {
            lines: source.lines(),
            partial: String::new(),
            emitted: 0,
        }
    }
}

impl<R: BufRead> Iterator for Statements<R> {
    type Item = io::Result<Statement>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e)),
                // a trailing unterminated fragment is discarded silently
                None => return None,
            };
            if RE_LINE_SKIP.is_match(&line) {
                continue;
            }
            // multi-line statements are joined with no separator; the
            // terminator check applies to the physical line only
            self.partial.push_str(&line);
            if !RE_STATEMENT_END.is_match(&line) {
                continue;
            }
            self.emitted += 1;
            return Some(Ok(Statement {
                text: mem::take(&mut self.partial),
                ordinal: self.emitted,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Statement, Statements};
    use std::io::Cursor;

    fn lex(input: &str) -> Vec<Statement> {
        Statements::new(Cursor::new(input.to_owned()))
            .map(|s| s.unwrap())
            .collect()
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let ret = lex("-- comment\n\nSELECT 1;\n");
        assert_eq!(
            ret,
            vec![Statement {
                text: "SELECT 1;".to_owned(),
                ordinal: 1
            }]
        );
    }

    #[test]
    fn multi_line_statement_is_joined_without_separator() {
        let ret = lex("insert into t\nvalues\n(1, 2);\n");
        assert_eq!(
            ret,
            vec![Statement {
                text: "insert into tvalues(1, 2);".to_owned(),
                ordinal: 1
            }]
        );
    }

    #[test]
    fn ordinals_count_emitted_statements() {
        let ret = lex("select 1;\n-- noise\nselect 2;\nselect 3;\n");
        assert_eq!(ret.len(), 3);
        assert_eq!(ret[2].ordinal, 3);
        assert_eq!(ret[2].text, "select 3;");
    }

    #[test]
    fn trailing_fragment_is_discarded() {
        let ret = lex("select 1;\nselect 2\nfrom t\n");
        assert_eq!(ret.len(), 1);
        assert_eq!(ret[0].text, "select 1;");
    }

    #[test]
    fn comment_between_statement_lines_is_dropped() {
        let ret = lex("insert into t\n-- halfway note\nvalues (1);\n");
        assert_eq!(ret[0].text, "insert into tvalues (1);");
    }

    #[test]
    fn terminator_must_end_the_physical_line() {
        // a ";" followed by trailing text does not terminate
        let ret = lex("select 1; -- not a terminator here\nselect 2;\n");
        assert_eq!(ret.len(), 1);
        assert_eq!(
            ret[0].text,
            "select 1; -- not a terminator hereselect 2;"
        );
    }
}
