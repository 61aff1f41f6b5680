/*
 * Created on Mon Sep 18 2023
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
    crate::connector::Response,
    crossterm::{
        style::{Color, ResetColor, SetForegroundColor},
        ExecutableCommand,
    },
    std::io::{self, Write},
};

pub fn format_response(resp: &Response) {
    match resp {
        Response::Empty => {
            let _ = print_cyan("(Okay)\n");
        }
        Response::Rows(rows) => {
            for row in rows {
                println!("{row}");
            }
        }
    }
}

pub fn format_error(e: impl std::fmt::Display) {
    let _ = print_red(&format!("SQL ERROR: {e}\n"));
}

fn print_red(s: &str) -> io::Result<()> {
    print_colored_text(s, Color::Red)
}

fn print_cyan(s: &str) -> io::Result<()> {
    print_colored_text(s, Color::Cyan)
}

fn print_colored_text(text: &str, color: Color) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(color))?;
    print!("{text}");
    stdout.flush()?;
    stdout.execute(ResetColor)?;
    Ok(())
}
