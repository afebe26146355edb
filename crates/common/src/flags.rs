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

use crate::util::BitEnum;
use bincode::{Decode, Encode};
use enum_primitive_derive::Primitive;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

/// The sole graph node kind, tagged. Objects can change kind (a destroyed
/// Thing becomes Garbage), which is why behavior dispatches on this tag and
/// never on anything structural.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Encode,
    Decode,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    EnumIter,
)]
pub enum ObjectKind {
    Room,
    Thing,
    Exit,
    Player,
    Garbage,
}

impl ObjectKind {
    /// The single-letter tag shown after a dbref in examine output.
    #[must_use]
    pub fn letter(&self) -> char {
        match self {
            ObjectKind::Room => 'R',
            ObjectKind::Thing => ' ',
            ObjectKind::Exit => 'E',
            ObjectKind::Player => 'P',
            ObjectKind::Garbage => 'G',
        }
    }
}

/// Boolean properties carried on every object. The persisted layout packs
/// these into flag words; in memory they are one bit set.
#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Encode, Decode)]
pub enum ObjFlag {
    Wizard = 0,
    Dark = 1,
    Haven = 2,
    Quiet = 3,
    Connected = 4,
    Unfindable = 5,
    Going = 6,
    ControlOk = 7,
    Light = 8,
    JumpOk = 9,
    EnterOk = 10,
    Sticky = 11,
    Guest = 12,
    Myopic = 13,
    Halted = 14,
    Safe = 15,
    LinkOk = 16,
    Visual = 17,
    Puppet = 18,
    NoSpoof = 19,
}

/// Fine-grained privilege bits, granted independently of the Wizard flag.
#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Encode, Decode)]
pub enum Power {
    PassLocks = 0,
    SeeAll = 1,
    Boot = 2,
    Announce = 3,
    UseSql = 4,
    Builder = 5,
    LongFingers = 6,
    Comm = 7,
    Halt = 8,
}

/// Render the set flags as the letter string shown in examine headers.
#[must_use]
pub fn obj_flag_letters(flags: BitEnum<ObjFlag>) -> String {
    const TABLE: &[(ObjFlag, char)] = &[
        (ObjFlag::Wizard, 'W'),
        (ObjFlag::Dark, 'D'),
        (ObjFlag::Haven, 'H'),
        (ObjFlag::Quiet, 'Q'),
        (ObjFlag::Connected, 'c'),
        (ObjFlag::Unfindable, 'U'),
        (ObjFlag::Going, 'G'),
        (ObjFlag::ControlOk, 'z'),
        (ObjFlag::Light, 'L'),
        (ObjFlag::JumpOk, 'J'),
        (ObjFlag::EnterOk, 'e'),
        (ObjFlag::Sticky, 'S'),
        (ObjFlag::Guest, 'g'),
        (ObjFlag::Myopic, 'm'),
        (ObjFlag::Halted, 'h'),
        (ObjFlag::Safe, 's'),
        (ObjFlag::LinkOk, 'l'),
        (ObjFlag::Visual, 'V'),
        (ObjFlag::Puppet, 'p'),
        (ObjFlag::NoSpoof, 'N'),
    ];
    TABLE
        .iter()
        .filter(|(f, _)| flags.contains(*f))
        .map(|(_, c)| *c)
        .collect()
}

#[must_use]
pub fn power_letters(powers: BitEnum<Power>) -> String {
    const TABLE: &[(Power, char)] = &[
        (Power::PassLocks, 'P'),
        (Power::SeeAll, 'A'),
        (Power::Boot, 'B'),
        (Power::Announce, 'a'),
        (Power::UseSql, 'Q'),
        (Power::Builder, 'b'),
        (Power::LongFingers, 'F'),
        (Power::Comm, 'C'),
        (Power::Halt, 'H'),
    ];
    TABLE
        .iter()
        .filter(|(p, _)| powers.contains(*p))
        .map(|(_, c)| *c)
        .collect()
}

/// Parse a flag name as given to `@set`. Accepts unique case-insensitive
/// prefixes, the way players actually type them.
pub fn parse_obj_flag(name: &str) -> Option<ObjFlag> {
    const NAMES: &[(&str, ObjFlag)] = &[
        ("wizard", ObjFlag::Wizard),
        ("dark", ObjFlag::Dark),
        ("haven", ObjFlag::Haven),
        ("quiet", ObjFlag::Quiet),
        ("connected", ObjFlag::Connected),
        ("unfindable", ObjFlag::Unfindable),
        ("going", ObjFlag::Going),
        ("control_ok", ObjFlag::ControlOk),
        ("light", ObjFlag::Light),
        ("jump_ok", ObjFlag::JumpOk),
        ("enter_ok", ObjFlag::EnterOk),
        ("sticky", ObjFlag::Sticky),
        ("guest", ObjFlag::Guest),
        ("myopic", ObjFlag::Myopic),
        ("halted", ObjFlag::Halted),
        ("safe", ObjFlag::Safe),
        ("link_ok", ObjFlag::LinkOk),
        ("visual", ObjFlag::Visual),
        ("puppet", ObjFlag::Puppet),
        ("no_spoof", ObjFlag::NoSpoof),
    ];
    let want = name.to_ascii_lowercase();
    let mut hit = None;
    for (n, f) in NAMES {
        if *n == want {
            return Some(*f);
        }
        if n.starts_with(&want) {
            if hit.is_some() {
                return None;
            }
            hit = Some(*f);
        }
    }
    hit
}

/// Display form used in examine headers: `Name(#5PWc)`.
pub struct FlagGlyphs {
    pub kind: ObjectKind,
    pub flags: BitEnum<ObjFlag>,
}

impl Display for FlagGlyphs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let k = self.kind.letter();
        if k != ' ' {
            write!(f, "{k}")?;
        }
        write!(f, "{}", obj_flag_letters(self.flags))
    }
}
