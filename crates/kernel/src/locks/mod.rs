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

//! The boolean lock expression language. Locks are parsed from attribute
//! text, evaluated against a tested player, and serialized back to a
//! canonical `#`-dbref form (names resolve at parse time; an unresolved
//! name becomes `#-1`, which never matches).

mod eval;
mod parse;

pub use eval::{
    MAX_LOCK_DEPTH, could_do_it, could_do_it_strict, eval_bool, eval_lock_text,
    handle_lock_failure,
};
pub use parse::{LockError, parse_lock};

use crate::world::World;
use marsh_common::Dbref;

/// A parsed lock expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolExpr {
    /// `#N` or a name that resolved to one. Passes when the tested player
    /// is N or carries N.
    Ref(Dbref),
    /// `attr:pattern` — wildcard match of the attribute on the tested
    /// player or anything it carries.
    Attr { name: String, pat: String },
    /// `attr/pattern` — the attribute is evaluated as softcode on the
    /// triggering actor (tested player as enactor) and the result matched.
    Eval { name: String, pat: String },
    /// `@X` — re-evaluate X's default lock, one level deeper.
    Indirect(Box<BoolExpr>),
    /// `+X` — carry test only.
    Carry(Box<BoolExpr>),
    /// `=X` — identity test only.
    Is(Box<BoolExpr>),
    /// `$X` — owner equality test.
    Owner(Box<BoolExpr>),
    Not(Box<BoolExpr>),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
}

// Precedence levels for the printers, low to high. Mirrors the grammar:
// E (or) < T (and) < F (prefix) < L (leaf).
fn level(e: &BoolExpr) -> u8 {
    match e {
        BoolExpr::Or(..) => 1,
        BoolExpr::And(..) => 2,
        BoolExpr::Not(..)
        | BoolExpr::Indirect(..)
        | BoolExpr::Carry(..)
        | BoolExpr::Is(..)
        | BoolExpr::Owner(..) => 3,
        BoolExpr::Ref(..) | BoolExpr::Attr { .. } | BoolExpr::Eval { .. } => 4,
    }
}

impl BoolExpr {
    /// Canonical serialization: every reference in `#N` form. This is the
    /// stored representation, and `parse(serialize(L)) ≡ L`.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        self.print(|d| d.to_string())
    }

    /// Display serialization: references shown by name where one exists.
    /// Only for human eyes; names need not re-parse to the same tree.
    #[must_use]
    pub fn to_display_string(&self, world: &World) -> String {
        self.print(|d| match world.graph.get(d) {
            Some(o) => o.display_name().to_string(),
            None => d.to_string(),
        })
    }

    fn print(&self, name_of: impl Fn(Dbref) -> String + Copy) -> String {
        self.print_at(1, name_of)
    }

    fn print_at(&self, min_level: u8, name_of: impl Fn(Dbref) -> String + Copy) -> String {
        let body = match self {
            BoolExpr::Ref(d) => name_of(*d),
            BoolExpr::Attr { name, pat } => format!("{name}:{pat}"),
            BoolExpr::Eval { name, pat } => format!("{name}/{pat}"),
            BoolExpr::Indirect(x) => format!("@{}", x.print_at(4, name_of)),
            BoolExpr::Carry(x) => format!("+{}", x.print_at(4, name_of)),
            BoolExpr::Is(x) => format!("={}", x.print_at(4, name_of)),
            BoolExpr::Owner(x) => format!("${}", x.print_at(4, name_of)),
            BoolExpr::Not(x) => format!("!{}", x.print_at(3, name_of)),
            BoolExpr::And(a, b) => format!(
                "{}&{}",
                a.print_at(3, name_of),
                b.print_at(2, name_of)
            ),
            BoolExpr::Or(a, b) => format!(
                "{}|{}",
                a.print_at(2, name_of),
                b.print_at(1, name_of)
            ),
        };
        if level(self) < min_level {
            format!("({body})")
        } else {
            body
        }
    }
}
