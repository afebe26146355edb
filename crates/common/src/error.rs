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

use crate::dbref::Dbref;
use thiserror::Error;

/// Errors out of world-graph and attribute operations. User-facing handlers
/// translate these into inline text lines; nothing here is ever fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Dbref),
    #[error("Attribute {1} not found on {0}")]
    AttributeNotFound(Dbref, u16),
    #[error("No such attribute definition: {0}")]
    AttributeNotDefined(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Invalid object name: {0}")]
    InvalidName(String),
    #[error("Recursion limit exceeded")]
    RecursionLimit,
    #[error("Could not place {0} inside {1}: containment cycle")]
    ContainmentCycle(Dbref, Dbref),
    #[error("Object {0} is not a {1}")]
    WrongKind(Dbref, &'static str),
}
