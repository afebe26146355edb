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

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Used throughout to refer to a missing object value.
pub const NOTHING: Dbref = Dbref::mk_id(-1);
/// Used in matching to indicate that the match was ambiguous on multiple objects in the
/// environment.
pub const AMBIGUOUS: Dbref = Dbref::mk_id(-2);
/// The "home" pseudo-destination, resolved through an object's link field.
pub const HOME: Dbref = Dbref::mk_id(-3);
/// God. Always controls everything, is never controlled.
pub const GOD: Dbref = Dbref::mk_id(1);

/// The stable integer identity of a world object. Names are mutable display
/// labels; a dbref is forever (until the object is garbage and the slot is
/// reused).
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Encode, Decode, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Dbref(i32);

impl Dbref {
    #[must_use]
    pub const fn mk_id(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(&self) -> i32 {
        self.0
    }

    /// True for any non-sentinel reference. Does not imply the object exists.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    #[must_use]
    pub const fn is_nothing(&self) -> bool {
        self.0 == NOTHING.0
    }

    /// Parse the `#n` display form. Bare integers are not accepted; the hash
    /// is what distinguishes a dbref from ordinary text in command input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#')?;
        let id: i32 = s.parse().ok()?;
        Some(Self(id))
    }
}

impl Display for Dbref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Debug for Dbref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dbref(#{})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        assert_eq!(Dbref::parse("#42"), Some(Dbref::mk_id(42)));
        assert_eq!(Dbref::parse("#-1"), Some(NOTHING));
        assert_eq!(Dbref::parse("42"), None);
        assert_eq!(Dbref::parse("#x"), None);
        assert_eq!(format!("{}", Dbref::mk_id(7)), "#7");
    }

    #[test]
    fn test_sentinels() {
        assert!(!NOTHING.is_valid());
        assert!(!AMBIGUOUS.is_valid());
        assert!(!HOME.is_valid());
        assert!(GOD.is_valid());
        assert!(NOTHING.is_nothing());
    }
}
