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
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// What kind of thing happened. Transports render these differently; the
/// durable channel log filters on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Say,
    Pose,
    Emit,
    Page,
    Whisper,
    Channel,
    System,
    Connect,
    Disconnect,
}

/// A record of something that happened in the world, routed to sessions and
/// global subscribers. `text` is the line a stream transport prints;
/// structured transports also get the `data` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    pub kind: EventKind,
    /// The object that authored or caused the event.
    pub source: Dbref,
    /// Player this event is addressed to, when it is addressed at all.
    pub target: Option<Dbref>,
    /// Room this event happened in, for room-scoped fan-out.
    pub room: Option<Dbref>,
    /// Channel name for Channel events.
    pub channel: Option<String>,
    pub text: String,
    /// Rich payload for structured transports.
    pub data: Option<serde_json::Value>,
    pub timestamp: SystemTime,
}

impl WorldEvent {
    #[must_use]
    pub fn new(kind: EventKind, source: Dbref, text: impl Into<String>) -> Self {
        Self {
            kind,
            source,
            target: None,
            room: None,
            channel: None,
            text: text.into(),
            data: None,
            timestamp: SystemTime::now(),
        }
    }

    /// A plain text line addressed to one player. The workhorse: almost all
    /// command output is one of these.
    #[must_use]
    pub fn system(target: Dbref, text: impl Into<String>) -> Self {
        let mut ev = Self::new(EventKind::System, target, text);
        ev.target = Some(target);
        ev
    }

    #[must_use]
    pub fn to_player(mut self, target: Dbref) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn in_room(mut self, room: Dbref) -> Self {
        self.room = Some(room);
        self
    }

    #[must_use]
    pub fn on_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbref::Dbref;

    #[test]
    fn test_builders() {
        let p = Dbref::mk_id(5);
        let r = Dbref::mk_id(0);
        let ev = WorldEvent::new(EventKind::Say, p, "hi").in_room(r);
        assert_eq!(ev.room, Some(r));
        assert_eq!(ev.target, None);
        let ev = WorldEvent::system(p, "Huh?");
        assert_eq!(ev.target, Some(p));
        assert_eq!(ev.kind, EventKind::System);
    }
}
