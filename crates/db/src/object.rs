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
use marsh_common::attr::AttrValue;
use marsh_common::util::BitEnum;
use marsh_common::{Dbref, NOTHING, ObjFlag, ObjectKind, Power};
use std::collections::BTreeMap;

/// A world object: the sole node kind in the graph. All cross-object
/// references are dbrefs, never handles; cycles are legal in the reference
/// graph (exits point back at rooms, parents can loop) and every traversal
/// guards itself.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Object {
    pub dbref: Dbref,
    pub kind: ObjectKind,
    /// Display name, optionally followed by `;`-separated aliases.
    pub name: String,
    /// Owning player. For players, themselves.
    pub owner: Dbref,
    /// Containing node. For exits this is the *destination*.
    pub location: Dbref,
    /// Head of the contents chain ("first child").
    pub contents: Dbref,
    /// Next sibling in whichever chain this object sits in.
    pub next: Dbref,
    /// For rooms, head of the exit chain. For exits, the *source* room.
    pub exits: Dbref,
    /// Home for things/players; link destination for rooms.
    pub link: Dbref,
    /// Attribute-inheritance parent.
    pub parent: Dbref,
    /// Secondary parent for control/lock delegation.
    pub zone: Dbref,
    pub flags: BitEnum<ObjFlag>,
    pub powers: BitEnum<Power>,
    pub pennies: i64,
    /// Attribute storage, keyed (uniquely) by attribute number.
    pub attrs: BTreeMap<u16, AttrValue>,
}

impl Object {
    pub fn new(dbref: Dbref, kind: ObjectKind, name: impl Into<String>, owner: Dbref) -> Self {
        Self {
            dbref,
            kind,
            name: name.into(),
            owner,
            location: NOTHING,
            contents: NOTHING,
            next: NOTHING,
            exits: NOTHING,
            link: NOTHING,
            parent: NOTHING,
            zone: NOTHING,
            flags: BitEnum::new(),
            powers: BitEnum::new(),
            pennies: 0,
            attrs: BTreeMap::new(),
        }
    }

    /// The display label: everything before the first `;`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.split(';').next().unwrap_or(&self.name)
    }

    /// All names this object answers to, display name first.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.name.split(';').filter(|s| !s.is_empty())
    }

    /// Name match for command/exit resolution: exact on any alias, else
    /// prefix when `allow_prefix`. Case-insensitive throughout.
    #[must_use]
    pub fn name_matches(&self, candidate: &str, allow_prefix: bool) -> bool {
        let want = candidate.trim();
        if want.is_empty() {
            return false;
        }
        for alias in self.aliases() {
            let alias = alias.trim();
            if alias.eq_ignore_ascii_case(want) {
                return true;
            }
            if allow_prefix
                && alias.len() > want.len()
                && alias[..want.len()].eq_ignore_ascii_case(want)
            {
                return true;
            }
        }
        false
    }

    #[must_use]
    pub fn is_going(&self) -> bool {
        self.flags.contains(ObjFlag::Going)
    }

    #[must_use]
    pub fn is_wizard(&self) -> bool {
        self.flags.contains(ObjFlag::Wizard)
    }

    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.flags.contains(ObjFlag::Dark)
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.flags.contains(ObjFlag::Guest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_and_matching() {
        let o = Object::new(
            Dbref::mk_id(10),
            ObjectKind::Exit,
            "North;n;no",
            Dbref::mk_id(1),
        );
        assert_eq!(o.display_name(), "North");
        assert_eq!(o.aliases().collect::<Vec<_>>(), vec!["North", "n", "no"]);
        assert!(o.name_matches("north", false));
        assert!(o.name_matches("N", false));
        assert!(o.name_matches("nor", true));
        assert!(!o.name_matches("nor", false));
        assert!(!o.name_matches("south", true));
        assert!(!o.name_matches("", true));
    }
}
