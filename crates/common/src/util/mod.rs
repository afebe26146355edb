// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

mod bitenum;
mod wildmatch;

pub use bitenum::BitEnum;
pub use wildmatch::{wild_match, wild_match_captures};

/// Split command input into words on whitespace. Double-quoted spans hold
/// together as one word, quotes stripped.
#[must_use]
pub fn parse_into_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Split on a top-level separator, respecting `{}` and `()` nesting. The
/// comma form is the argument-splitting rule for `@trigger obj/attr a, b`;
/// the semicolon form splits command lists in queued attribute text.
#[must_use]
pub fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut brace_depth = 0i32;
    let mut paren_depth = 0i32;

    for c in input.chars() {
        match c {
            '{' => {
                brace_depth += 1;
                current.push(c);
            }
            '}' => {
                brace_depth -= 1;
                current.push(c);
            }
            '(' => {
                paren_depth += 1;
                current.push(c);
            }
            ')' => {
                paren_depth -= 1;
                current.push(c);
            }
            c if c == sep && brace_depth <= 0 && paren_depth <= 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    let last = current.trim().to_string();
    if !last.is_empty() || !out.is_empty() {
        out.push(last);
    }
    out
}

#[must_use]
pub fn split_top_level_commas(input: &str) -> Vec<String> {
    split_top_level(input, ',')
}

/// Strip an outer brace pair, the grouping syntax in queued command text.
#[must_use]
pub fn strip_braces(s: &str) -> &str {
    let t = s.trim();
    if t.len() >= 2 && t.starts_with('{') && t.ends_with('}') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}
