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

//! Hand recursive-descent parser for the lock grammar:
//!
//! ```text
//! E  → T ('|' E)?
//! T  → F ('&' T)?
//! F  → '!' F | '@' L | '+' L | '=' L | '$' L | L
//! L  → '(' E ')' | '#' NUM | NAME ':' PAT | NAME '/' PAT | NAME
//! ```
//!
//! Names resolve to dbrefs at parse time through the supplied resolver;
//! unresolved names become `#-1`, which never matches. The first `:` or `/`
//! inside a leaf is the attribute separator, wherever the leaf appears —
//! names carrying those characters cannot be expressed, and that is the
//! historical behavior.

use super::BoolExpr;
use marsh_common::Dbref;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Empty lock expression")]
    Empty,
    #[error("Unexpected character {0:?} at {1}")]
    UnexpectedChar(char, usize),
    #[error("Unbalanced parenthesis at {0}")]
    UnbalancedParen(usize),
    #[error("Bad dbref at {0}")]
    BadDbref(usize),
    #[error("Trailing text at {0}")]
    TrailingText(usize),
}

pub fn parse_lock(
    text: &str,
    resolver: &dyn Fn(&str) -> Dbref,
) -> Result<BoolExpr, LockError> {
    let mut p = Parser {
        chars: text.chars().collect(),
        pos: 0,
        resolver,
    };
    p.skip_ws();
    if p.at_end() {
        return Err(LockError::Empty);
    }
    let expr = p.parse_expr()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(LockError::TrailingText(p.pos));
    }
    Ok(expr)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    resolver: &'a dyn Fn(&str) -> Dbref,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_expr(&mut self) -> Result<BoolExpr, LockError> {
        let left = self.parse_term()?;
        self.skip_ws();
        if self.peek() == Some('|') {
            self.bump();
            let right = self.parse_expr()?;
            return Ok(BoolExpr::Or(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<BoolExpr, LockError> {
        let left = self.parse_factor()?;
        self.skip_ws();
        if self.peek() == Some('&') {
            self.bump();
            let right = self.parse_term()?;
            return Ok(BoolExpr::And(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<BoolExpr, LockError> {
        self.skip_ws();
        match self.peek() {
            Some('!') => {
                self.bump();
                Ok(BoolExpr::Not(Box::new(self.parse_factor()?)))
            }
            Some('@') => {
                self.bump();
                Ok(BoolExpr::Indirect(Box::new(self.parse_leaf()?)))
            }
            Some('+') => {
                self.bump();
                Ok(BoolExpr::Carry(Box::new(self.parse_leaf()?)))
            }
            Some('=') => {
                self.bump();
                Ok(BoolExpr::Is(Box::new(self.parse_leaf()?)))
            }
            Some('$') => {
                self.bump();
                Ok(BoolExpr::Owner(Box::new(self.parse_leaf()?)))
            }
            _ => self.parse_leaf(),
        }
    }

    fn parse_leaf(&mut self) -> Result<BoolExpr, LockError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LockError::Empty),
            Some('(') => {
                let open = self.pos;
                self.bump();
                let inner = self.parse_expr()?;
                self.skip_ws();
                if self.bump() != Some(')') {
                    return Err(LockError::UnbalancedParen(open));
                }
                Ok(inner)
            }
            Some('#') => {
                self.bump();
                let start = self.pos;
                if self.peek() == Some('-') {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let id: i32 = digits.parse().map_err(|_| LockError::BadDbref(start))?;
                Ok(BoolExpr::Ref(Dbref::mk_id(id)))
            }
            Some(c) if is_terminator(c) => Err(LockError::UnexpectedChar(c, self.pos)),
            Some(_) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !is_terminator(c)) {
                    self.bump();
                }
                let leaf: String = self.chars[start..self.pos].iter().collect();
                let leaf = leaf.trim();
                if leaf.is_empty() {
                    return Err(LockError::UnexpectedChar(' ', start));
                }
                // First ':' or '/' splits name from pattern, whichever
                // comes first.
                let colon = leaf.find(':');
                let slash = leaf.find('/');
                match (colon, slash) {
                    (Some(ci), si) if si.is_none_or(|s| ci < s) => {
                        Ok(BoolExpr::Attr {
                            name: leaf[..ci].trim().to_ascii_uppercase(),
                            pat: leaf[ci + 1..].trim().to_string(),
                        })
                    }
                    (_, Some(si)) => Ok(BoolExpr::Eval {
                        name: leaf[..si].trim().to_ascii_uppercase(),
                        pat: leaf[si + 1..].trim().to_string(),
                    }),
                    _ => Ok(BoolExpr::Ref((self.resolver)(leaf))),
                }
            }
        }
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '&' | '|' | ')' | '(')
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::{AMBIGUOUS, NOTHING};
    use pretty_assertions::assert_eq;

    fn null(_: &str) -> Dbref {
        NOTHING
    }

    #[test]
    fn test_leaves() {
        assert_eq!(parse_lock("#42", &null).unwrap(), BoolExpr::Ref(Dbref::mk_id(42)));
        assert_eq!(parse_lock("#-1", &null).unwrap(), BoolExpr::Ref(NOTHING));
        assert_eq!(parse_lock("sex:m*", &null).unwrap(), BoolExpr::Attr {
            name: "SEX".into(),
            pat: "m*".into()
        });
        assert_eq!(parse_lock("power/yes", &null).unwrap(), BoolExpr::Eval {
            name: "POWER".into(),
            pat: "yes".into()
        });
    }

    #[test]
    fn test_name_resolution() {
        let resolver = |name: &str| {
            if name.eq_ignore_ascii_case("otter") {
                Dbref::mk_id(7)
            } else {
                NOTHING
            }
        };
        assert_eq!(
            parse_lock("Otter", &resolver).unwrap(),
            BoolExpr::Ref(Dbref::mk_id(7))
        );
        // Unresolved serializes to #-1, which never matches.
        assert_eq!(
            parse_lock("nobody", &resolver).unwrap().to_canonical_string(),
            "#-1"
        );
    }

    #[test]
    fn test_precedence() {
        // '&' binds tighter than '|'.
        let e = parse_lock("#1|#2&#3", &null).unwrap();
        assert_eq!(
            e,
            BoolExpr::Or(
                Box::new(BoolExpr::Ref(Dbref::mk_id(1))),
                Box::new(BoolExpr::And(
                    Box::new(BoolExpr::Ref(Dbref::mk_id(2))),
                    Box::new(BoolExpr::Ref(Dbref::mk_id(3))),
                )),
            )
        );
    }

    #[test]
    fn test_prefix_operators() {
        let e = parse_lock("!+#5", &null).unwrap();
        assert_eq!(
            e,
            BoolExpr::Not(Box::new(BoolExpr::Carry(Box::new(BoolExpr::Ref(
                Dbref::mk_id(5)
            )))))
        );
        assert!(matches!(parse_lock("@#7", &null).unwrap(), BoolExpr::Indirect(_)));
        assert!(matches!(parse_lock("=#7", &null).unwrap(), BoolExpr::Is(_)));
        assert!(matches!(parse_lock("$#7", &null).unwrap(), BoolExpr::Owner(_)));
    }

    #[test]
    fn test_separator_quirk_inside_groups() {
        // The first ':' splits even inside a grouped subexpression.
        let e = parse_lock("(weird:name&#3)", &null).unwrap();
        assert_eq!(
            e,
            BoolExpr::And(
                Box::new(BoolExpr::Attr {
                    name: "WEIRD".into(),
                    pat: "name".into()
                }),
                Box::new(BoolExpr::Ref(Dbref::mk_id(3))),
            )
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_lock("", &null), Err(LockError::Empty));
        assert_eq!(parse_lock("   ", &null), Err(LockError::Empty));
        assert!(matches!(parse_lock("(#1", &null), Err(LockError::UnbalancedParen(_))));
        assert!(matches!(parse_lock("#x", &null), Err(LockError::BadDbref(_))));
        assert!(matches!(parse_lock("#1 #2", &null), Err(LockError::TrailingText(_))));
    }

    #[test]
    fn test_ambiguous_sentinel_is_representable() {
        assert_eq!(parse_lock("#-2", &null).unwrap(), BoolExpr::Ref(AMBIGUOUS));
    }
}
