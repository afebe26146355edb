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

use crate::object::Object;
use bincode::{Decode, Encode};
use marsh_common::Dbref;
use marsh_common::attr::AttrDef;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// World-level metadata persisted alongside the objects.
#[derive(Debug, Clone, Encode, Decode)]
pub struct WorldMeta {
    pub layout_version: u8,
    pub next_dbref: i32,
}

/// A durable chat channel record.
#[derive(Debug, Clone, Encode, Decode)]
pub struct ChannelRecord {
    pub name: String,
    pub owner: Dbref,
    pub header: String,
}

/// A durable mail message.
#[derive(Debug, Clone, Encode, Decode)]
pub struct MailRecord {
    pub to: Dbref,
    pub from: Dbref,
    pub index: u32,
    pub sent: SystemTime,
    pub subject: String,
    pub body: String,
    pub read: bool,
}

/// The durable write-through surface the runtime calls synchronously on
/// every mutation. The in-memory graph is authoritative; a failed write is
/// logged by the caller and the in-memory change stands. No transactional
/// semantics beyond per-record atomicity.
pub trait WorldPersistence: Send + Sync {
    fn put_object(&self, obj: &Object) -> Result<(), PersistenceError>;

    fn put_objects(&self, objs: &[&Object]) -> Result<(), PersistenceError> {
        for o in objs {
            self.put_object(o)?;
        }
        Ok(())
    }

    fn put_attr_def(&self, def: &AttrDef) -> Result<(), PersistenceError>;

    fn put_meta(&self, meta: &WorldMeta) -> Result<(), PersistenceError>;

    /// Maintain the durable name → dbref index used by login. `old_name` is
    /// the previous full name-with-aliases string on rename.
    fn update_player_index(&self, obj: &Object, old_name: Option<&str>)
    -> Result<(), PersistenceError>;

    fn put_channel(&self, channel: &ChannelRecord) -> Result<(), PersistenceError>;
    fn delete_channel(&self, name: &str) -> Result<(), PersistenceError>;

    fn put_channel_alias(
        &self,
        player: Dbref,
        alias: &str,
        channel: &str,
    ) -> Result<(), PersistenceError>;
    fn delete_channel_alias(&self, player: Dbref, alias: &str) -> Result<(), PersistenceError>;

    fn put_mail(&self, mail: &MailRecord) -> Result<(), PersistenceError>;
    fn delete_mail(&self, player: Dbref, index: u32) -> Result<(), PersistenceError>;

    /// Reconstitute the world at startup.
    fn load_objects(&self) -> Result<Vec<Object>, PersistenceError>;
    fn load_attr_defs(&self) -> Result<Vec<AttrDef>, PersistenceError>;
    fn load_meta(&self) -> Result<Option<WorldMeta>, PersistenceError>;

    /// Flush and release. Called once, last, during shutdown.
    fn close(&self) -> Result<(), PersistenceError>;
}

/// Adapter that remembers nothing. Used by tests and by ephemeral worlds.
pub struct NullPersistence;

impl WorldPersistence for NullPersistence {
    fn put_object(&self, _obj: &Object) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn put_attr_def(&self, _def: &AttrDef) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn put_meta(&self, _meta: &WorldMeta) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn update_player_index(
        &self,
        _obj: &Object,
        _old_name: Option<&str>,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn put_channel(&self, _channel: &ChannelRecord) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn delete_channel(&self, _name: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn put_channel_alias(
        &self,
        _player: Dbref,
        _alias: &str,
        _channel: &str,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn delete_channel_alias(&self, _player: Dbref, _alias: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn put_mail(&self, _mail: &MailRecord) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn delete_mail(&self, _player: Dbref, _index: u32) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn load_objects(&self) -> Result<Vec<Object>, PersistenceError> {
        Ok(vec![])
    }
    fn load_attr_defs(&self) -> Result<Vec<AttrDef>, PersistenceError> {
        Ok(vec![])
    }
    fn load_meta(&self) -> Result<Option<WorldMeta>, PersistenceError> {
        Ok(None)
    }
    fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
