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

//! Wildcard pattern matching for `$`-commands, listen patterns, and
//! `attr:pattern` lock leaves. Matching is case-insensitive; captured spans
//! preserve the case of the input.
//!
//! `*` matches any span (including empty), `?` matches exactly one
//! character, `\` escapes the next pattern character. Every `*` and `?`
//! records a capture, in pattern order.

/// True if `pattern` matches the whole of `input`.
#[must_use]
pub fn wild_match(pattern: &str, input: &str) -> bool {
    wild_match_captures(pattern, input).is_some()
}

/// Match and return the captured spans, or `None` on mismatch. Wildcards
/// resolve shortest-first, so `"* says *"` against `"Otter says hello"`
/// captures `["Otter", "hello"]`.
#[must_use]
pub fn wild_match_captures(pattern: &str, input: &str) -> Option<Vec<String>> {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = input.chars().collect();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    if match_at(&p, 0, &s, 0, &mut spans) {
        Some(
            spans
                .iter()
                .map(|(a, b)| s[*a..*b].iter().collect())
                .collect(),
        )
    } else {
        None
    }
}

fn chars_eq(a: char, b: char) -> bool {
    a.eq_ignore_ascii_case(&b)
}

fn match_at(
    p: &[char],
    pi: usize,
    s: &[char],
    si: usize,
    spans: &mut Vec<(usize, usize)>,
) -> bool {
    if pi == p.len() {
        return si == s.len();
    }
    match p[pi] {
        '*' => {
            for end in si..=s.len() {
                spans.push((si, end));
                if match_at(p, pi + 1, s, end, spans) {
                    return true;
                }
                spans.pop();
            }
            false
        }
        '?' => {
            if si < s.len() {
                spans.push((si, si + 1));
                if match_at(p, pi + 1, s, si + 1, spans) {
                    return true;
                }
                spans.pop();
            }
            false
        }
        '\\' if pi + 1 < p.len() => {
            si < s.len() && chars_eq(p[pi + 1], s[si]) && match_at(p, pi + 2, s, si + 1, spans)
        }
        c => si < s.len() && chars_eq(c, s[si]) && match_at(p, pi + 1, s, si + 1, spans),
    }
}
