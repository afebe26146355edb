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

//! Attribute numbering, definitions, and the raw stored-value form.
//!
//! Attribute numbers are the stable identity; names are an index over the
//! definitions. Permission checks consult the definition flags, never the
//! name. Well-known numbers sit below [`A_USER_START`]; user definitions are
//! allocated monotonically above it.

use crate::dbref::{Dbref, NOTHING};
use crate::util::BitEnum;
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use enum_primitive_derive::Primitive;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Per-definition and per-instance attribute flags. One bit space serves
/// both; instance flags are OR'd over definition flags when checking access.
#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Encode, Decode)]
pub enum AttrFlag {
    /// The value is a lock expression; setting it re-parses.
    IsLock = 0,
    /// Never matched during `$`-command scans.
    NoCommand = 1,
    /// May not be changed once set, by anyone.
    Const = 2,
    /// Hidden from everyone but God.
    Dark = 3,
    /// Value is HTML and is passed through markup translation.
    Html = 4,
    /// Server bookkeeping; unreadable and unsettable from softcode.
    Internal = 5,
    /// Hidden from mortals, visible to wizards.
    MortalDark = 6,
    /// Elided from examine listings.
    NoName = 7,
    /// Evaluator substitution is skipped when fetched.
    NoParse = 8,
    /// Not copied when the object is cloned.
    NoClone = 9,
    /// Listen/`$` patterns on this attribute use regexp syntax.
    Regexp = 10,
    /// Structured-data attribute; adapter persists a typed instance.
    Structure = 11,
    /// Evaluations of this attribute are traced to the owner.
    Trace = 12,
    /// Readable by anyone.
    Visual = 13,
    /// Pattern matching on this attribute is case-sensitive.
    Case = 14,
    /// Definition supplies a default value for instances.
    Default = 15,
    /// Settable by God only.
    GodOnly = 16,
    /// Pattern captures feed `%0`-`%9` on match.
    Rmatch = 17,
    /// New instances lazily copy owner and flags from the parent's copy.
    Propagate = 18,
    /// Settable by wizards only.
    WizOnly = 19,
    /// Not inherited through the parent chain.
    Private = 20,
}

/// The fixed examine letter table: `+$CDHIMNPQRSTVcdgkmwp`.
const ATTR_FLAG_LETTERS: &[(AttrFlag, char)] = &[
    (AttrFlag::IsLock, '+'),
    (AttrFlag::NoCommand, '$'),
    (AttrFlag::Const, 'C'),
    (AttrFlag::Dark, 'D'),
    (AttrFlag::Html, 'H'),
    (AttrFlag::Internal, 'I'),
    (AttrFlag::MortalDark, 'M'),
    (AttrFlag::NoName, 'N'),
    (AttrFlag::NoParse, 'P'),
    (AttrFlag::NoClone, 'Q'),
    (AttrFlag::Regexp, 'R'),
    (AttrFlag::Structure, 'S'),
    (AttrFlag::Trace, 'T'),
    (AttrFlag::Visual, 'V'),
    (AttrFlag::Case, 'c'),
    (AttrFlag::Default, 'd'),
    (AttrFlag::GodOnly, 'g'),
    (AttrFlag::Rmatch, 'k'),
    (AttrFlag::Propagate, 'm'),
    (AttrFlag::WizOnly, 'w'),
    (AttrFlag::Private, 'p'),
];

#[must_use]
pub fn attr_flag_letters(flags: BitEnum<AttrFlag>) -> String {
    ATTR_FLAG_LETTERS
        .iter()
        .filter(|(f, _)| flags.contains(*f))
        .map(|(_, c)| *c)
        .collect()
}

// Well-known attribute numbers. The registry reserves everything below
// A_USER_START; these are the ones the server itself consults.
pub const A_OSUCC: u16 = 1;
pub const A_OFAIL: u16 = 2;
pub const A_FAIL: u16 = 3;
pub const A_SUCC: u16 = 4;
pub const A_PASS: u16 = 5;
pub const A_DESC: u16 = 6;
pub const A_SEX: u16 = 7;
pub const A_ODROP: u16 = 8;
pub const A_DROP: u16 = 9;
pub const A_ASUCC: u16 = 10;
pub const A_AFAIL: u16 = 11;
pub const A_ADROP: u16 = 12;
pub const A_STARTUP: u16 = 13;
pub const A_ACONNECT: u16 = 14;
pub const A_ADISCONNECT: u16 = 15;
pub const A_LISTEN: u16 = 16;
pub const A_AHEAR: u16 = 17;
pub const A_AMHEAR: u16 = 18;
pub const A_AAHEAR: u16 = 19;
pub const A_IDESC: u16 = 20;
pub const A_ENTER: u16 = 21;
pub const A_OENTER: u16 = 22;
pub const A_AENTER: u16 = 23;
pub const A_LEAVE: u16 = 24;
pub const A_OLEAVE: u16 = 25;
pub const A_ALEAVE: u16 = 26;
pub const A_MOVE: u16 = 27;
pub const A_OMOVE: u16 = 28;
pub const A_AMOVE: u16 = 29;
pub const A_ALIAS: u16 = 30;
pub const A_EALIAS: u16 = 31;
pub const A_LALIAS: u16 = 32;
pub const A_NAMEFORMAT: u16 = 33;
pub const A_CONFORMAT: u16 = 34;
pub const A_EXITFORMAT: u16 = 35;
pub const A_AWAY: u16 = 36;
pub const A_IDLE: u16 = 37;
pub const A_REJECT: u16 = 38;
pub const A_LAST: u16 = 39;
pub const A_QUEUEMAX: u16 = 40;
pub const A_SEMAPHORE: u16 = 41;
pub const A_LOCK: u16 = 42;
pub const A_LENTER: u16 = 43;
pub const A_LLEAVE: u16 = 44;
pub const A_LUSE: u16 = 45;
pub const A_LGIVE: u16 = 46;
pub const A_LRECEIVE: u16 = 47;
pub const A_EFAIL: u16 = 48;
pub const A_OEFAIL: u16 = 49;
pub const A_AEFAIL: u16 = 50;
pub const A_LFAIL: u16 = 51;
pub const A_OLFAIL: u16 = 52;
pub const A_ALFAIL: u16 = 53;
pub const A_UFAIL: u16 = 54;
pub const A_OUFAIL: u16 = 55;
pub const A_AUFAIL: u16 = 56;
pub const A_GFAIL: u16 = 57;
pub const A_OGFAIL: u16 = 58;
pub const A_AGFAIL: u16 = 59;
pub const A_RFAIL: u16 = 60;
pub const A_ORFAIL: u16 = 61;
pub const A_ARFAIL: u16 = 62;
pub const A_LCONTROL: u16 = 63;

/// First number handed out for user-defined attributes.
pub const A_USER_START: u16 = 256;

/// The lock families with fixed attribute numbers: each has a lock
/// expression slot plus a Fail/OFail/AFail message triple.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Encode, Decode)]
pub enum LockKind {
    Default,
    Enter,
    Leave,
    Use,
    Give,
    Receive,
}

impl LockKind {
    #[must_use]
    pub fn lock_attr(&self) -> u16 {
        match self {
            LockKind::Default => A_LOCK,
            LockKind::Enter => A_LENTER,
            LockKind::Leave => A_LLEAVE,
            LockKind::Use => A_LUSE,
            LockKind::Give => A_LGIVE,
            LockKind::Receive => A_LRECEIVE,
        }
    }

    /// (fail-to-actor, fail-to-room, fail-action) attribute numbers.
    #[must_use]
    pub fn fail_attrs(&self) -> (u16, u16, u16) {
        match self {
            LockKind::Default => (A_FAIL, A_OFAIL, A_AFAIL),
            LockKind::Enter => (A_EFAIL, A_OEFAIL, A_AEFAIL),
            LockKind::Leave => (A_LFAIL, A_OLFAIL, A_ALFAIL),
            LockKind::Use => (A_UFAIL, A_OUFAIL, A_AUFAIL),
            LockKind::Give => (A_GFAIL, A_OGFAIL, A_AGFAIL),
            LockKind::Receive => (A_RFAIL, A_ORFAIL, A_ARFAIL),
        }
    }
}

/// A process-wide attribute definition: number, canonical uppercase name,
/// definition flags.
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct AttrDef {
    pub num: u16,
    pub name: String,
    pub flags: BitEnum<AttrFlag>,
}

impl AttrDef {
    pub fn new(num: u16, name: &str, flags: BitEnum<AttrFlag>) -> Self {
        Self {
            num,
            name: name.to_ascii_uppercase(),
            flags,
        }
    }
}

/// The registry mapping attribute number ↔ name. Seeded with the well-known
/// table at startup; user definitions allocate monotonically from
/// [`A_USER_START`].
pub struct AttrRegistry {
    by_num: HashMap<u16, AttrDef>,
    by_name: HashMap<String, u16>,
    next_user: u16,
}

impl AttrRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut reg = Self {
            by_num: HashMap::new(),
            by_name: HashMap::new(),
            next_user: A_USER_START,
        };
        for def in builtin_attr_defs() {
            reg.insert(def);
        }
        reg
    }

    fn insert(&mut self, def: AttrDef) {
        self.by_name.insert(def.name.clone(), def.num);
        self.by_num.insert(def.num, def);
    }

    #[must_use]
    pub fn get(&self, num: u16) -> Option<&AttrDef> {
        self.by_num.get(&num)
    }

    /// Case-insensitive name lookup.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&AttrDef> {
        let num = self.by_name.get(&name.to_ascii_uppercase())?;
        self.by_num.get(num)
    }

    /// Look the name up, defining a fresh user attribute if it is unknown.
    /// Returns the definition's number.
    pub fn resolve_or_define(&mut self, name: &str) -> u16 {
        let upper = name.to_ascii_uppercase();
        if let Some(num) = self.by_name.get(&upper) {
            return *num;
        }
        let num = self.next_user;
        self.next_user += 1;
        self.insert(AttrDef::new(num, &upper, BitEnum::new()));
        num
    }

    /// Restore a definition loaded from the adapter, keeping the user
    /// allocator ahead of everything seen.
    pub fn restore(&mut self, def: AttrDef) {
        if def.num >= self.next_user {
            self.next_user = def.num + 1;
        }
        self.insert(def);
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttrDef> {
        self.by_num.values()
    }
}

impl Default for AttrRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored attribute value: owner, per-instance flags, text. The raw
/// persisted form is `\x01<owner>:<flags>:<text>`; a value without the
/// marker byte decodes as owner-of-object (NOTHING here), no flags.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AttrValue {
    pub owner: Dbref,
    pub flags: BitEnum<AttrFlag>,
    pub text: String,
}

impl AttrValue {
    pub fn new(owner: Dbref, flags: BitEnum<AttrFlag>, text: impl Into<String>) -> Self {
        Self {
            owner,
            flags,
            text: text.into(),
        }
    }

    /// Decode the raw stored form.
    #[must_use]
    pub fn decode_raw(raw: &str) -> Self {
        let Some(rest) = raw.strip_prefix('\u{1}') else {
            return Self::new(NOTHING, BitEnum::new(), raw);
        };
        let Some((owner_s, rest)) = rest.split_once(':') else {
            return Self::new(NOTHING, BitEnum::new(), raw);
        };
        let Some((flags_s, text)) = rest.split_once(':') else {
            return Self::new(NOTHING, BitEnum::new(), raw);
        };
        let (Ok(owner), Ok(flags)) = (owner_s.parse::<i32>(), flags_s.parse::<u64>()) else {
            return Self::new(NOTHING, BitEnum::new(), raw);
        };
        Self::new(Dbref::mk_id(owner), BitEnum::from_u64(flags), text)
    }

    /// Encode to the raw stored form. A value owned by the object itself
    /// with no instance flags stores as bare text.
    #[must_use]
    pub fn encode_raw(&self) -> String {
        if self.owner == NOTHING && self.flags.is_empty() {
            return self.text.clone();
        }
        format!(
            "\u{1}{}:{}:{}",
            self.owner.id(),
            self.flags.to_u64(),
            self.text
        )
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// Persisted attribute values are the raw `\x01`-prefixed text, not a field
// struct, so adapter records keep the layout the wire contract names.
impl Encode for AttrValue {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.encode_raw().encode(encoder)
    }
}

impl<C> Decode<C> for AttrValue {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let raw = String::decode(decoder)?;
        Ok(Self::decode_raw(&raw))
    }
}

impl<'de, C> BorrowDecode<'de, C> for AttrValue {
    fn borrow_decode<D: BorrowDecoder<'de>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let raw = String::borrow_decode(decoder)?;
        Ok(Self::decode_raw(&raw))
    }
}

fn builtin_attr_defs() -> Vec<AttrDef> {
    use AttrFlag::*;
    let none = BitEnum::new;
    let f = |flags: &[AttrFlag]| {
        let mut b = BitEnum::new();
        for fl in flags {
            b.set(*fl);
        }
        b
    };
    vec![
        AttrDef::new(A_OSUCC, "OSUCC", none()),
        AttrDef::new(A_OFAIL, "OFAIL", none()),
        AttrDef::new(A_FAIL, "FAIL", none()),
        AttrDef::new(A_SUCC, "SUCC", none()),
        AttrDef::new(A_PASS, "PASS", f(&[Internal, Dark])),
        AttrDef::new(A_DESC, "DESC", f(&[Visual])),
        AttrDef::new(A_SEX, "SEX", f(&[Visual])),
        AttrDef::new(A_ODROP, "ODROP", none()),
        AttrDef::new(A_DROP, "DROP", none()),
        AttrDef::new(A_ASUCC, "ASUCC", none()),
        AttrDef::new(A_AFAIL, "AFAIL", none()),
        AttrDef::new(A_ADROP, "ADROP", none()),
        AttrDef::new(A_STARTUP, "STARTUP", none()),
        AttrDef::new(A_ACONNECT, "ACONNECT", none()),
        AttrDef::new(A_ADISCONNECT, "ADISCONNECT", none()),
        AttrDef::new(A_LISTEN, "LISTEN", none()),
        AttrDef::new(A_AHEAR, "AHEAR", none()),
        AttrDef::new(A_AMHEAR, "AMHEAR", none()),
        AttrDef::new(A_AAHEAR, "AAHEAR", none()),
        AttrDef::new(A_IDESC, "IDESC", none()),
        AttrDef::new(A_ENTER, "ENTER", none()),
        AttrDef::new(A_OENTER, "OENTER", none()),
        AttrDef::new(A_AENTER, "AENTER", none()),
        AttrDef::new(A_LEAVE, "LEAVE", none()),
        AttrDef::new(A_OLEAVE, "OLEAVE", none()),
        AttrDef::new(A_ALEAVE, "ALEAVE", none()),
        AttrDef::new(A_MOVE, "MOVE", none()),
        AttrDef::new(A_OMOVE, "OMOVE", none()),
        AttrDef::new(A_AMOVE, "AMOVE", none()),
        AttrDef::new(A_ALIAS, "ALIAS", f(&[NoClone])),
        AttrDef::new(A_EALIAS, "EALIAS", none()),
        AttrDef::new(A_LALIAS, "LALIAS", none()),
        AttrDef::new(A_NAMEFORMAT, "NAMEFORMAT", none()),
        AttrDef::new(A_CONFORMAT, "CONFORMAT", none()),
        AttrDef::new(A_EXITFORMAT, "EXITFORMAT", none()),
        AttrDef::new(A_AWAY, "AWAY", none()),
        AttrDef::new(A_IDLE, "IDLE", none()),
        AttrDef::new(A_REJECT, "REJECT", none()),
        AttrDef::new(A_LAST, "LAST", f(&[Internal])),
        AttrDef::new(A_QUEUEMAX, "QUEUEMAX", f(&[WizOnly])),
        AttrDef::new(A_SEMAPHORE, "SEMAPHORE", f(&[NoCommand])),
        AttrDef::new(A_LOCK, "LOCK", f(&[IsLock, NoCommand])),
        AttrDef::new(A_LENTER, "ENTERLOCK", f(&[IsLock, NoCommand])),
        AttrDef::new(A_LLEAVE, "LEAVELOCK", f(&[IsLock, NoCommand])),
        AttrDef::new(A_LUSE, "USELOCK", f(&[IsLock, NoCommand])),
        AttrDef::new(A_LGIVE, "GIVELOCK", f(&[IsLock, NoCommand])),
        AttrDef::new(A_LRECEIVE, "RECEIVELOCK", f(&[IsLock, NoCommand])),
        AttrDef::new(A_EFAIL, "EFAIL", none()),
        AttrDef::new(A_OEFAIL, "OEFAIL", none()),
        AttrDef::new(A_AEFAIL, "AEFAIL", none()),
        AttrDef::new(A_LFAIL, "LFAIL", none()),
        AttrDef::new(A_OLFAIL, "OLFAIL", none()),
        AttrDef::new(A_ALFAIL, "ALFAIL", none()),
        AttrDef::new(A_UFAIL, "UFAIL", none()),
        AttrDef::new(A_OUFAIL, "OUFAIL", none()),
        AttrDef::new(A_AUFAIL, "AUFAIL", none()),
        AttrDef::new(A_GFAIL, "GFAIL", none()),
        AttrDef::new(A_OGFAIL, "OGFAIL", none()),
        AttrDef::new(A_AGFAIL, "AGFAIL", none()),
        AttrDef::new(A_RFAIL, "RFAIL", none()),
        AttrDef::new(A_ORFAIL, "ORFAIL", none()),
        AttrDef::new(A_ARFAIL, "ARFAIL", none()),
        AttrDef::new(A_LCONTROL, "CONTROLLOCK", f(&[IsLock, NoCommand])),
    ]
}
