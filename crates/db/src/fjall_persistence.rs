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

//! Fjall-backed persistence adapter: one partition per record family,
//! bincode-encoded values.

use crate::object::Object;
use crate::persistence::{
    ChannelRecord, MailRecord, PersistenceError, WorldMeta, WorldPersistence,
};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use marsh_common::attr::AttrDef;
use marsh_common::{BINCODE_CONFIG, Dbref};
use std::path::Path;
use tracing::info;

const META_KEY: &[u8] = b"world_meta";

pub struct FjallPersistence {
    _tmpdir: Option<tempfile::TempDir>,
    _keyspace: Keyspace,
    objects: PartitionHandle,
    attr_defs: PartitionHandle,
    meta: PartitionHandle,
    player_index: PartitionHandle,
    channels: PartitionHandle,
    channel_aliases: PartitionHandle,
    mail: PartitionHandle,
}

impl FjallPersistence {
    /// Open (or create) the database at `path`. `None` opens in a temp
    /// directory, for tests and throwaway worlds.
    pub fn open(path: Option<&Path>) -> Result<Self, PersistenceError> {
        let (tmpdir, path) = match path {
            Some(path) => (None, path.to_path_buf()),
            None => {
                let tmpdir = tempfile::TempDir::new()
                    .map_err(|e| PersistenceError::Storage(e.to_string()))?;
                let path = tmpdir.path().to_path_buf();
                (Some(tmpdir), path)
            }
        };

        info!("Opening world database at {:?}", path);
        let keyspace = Config::new(&path).open().map_err(storage_err)?;
        let open = |name: &str| -> Result<PartitionHandle, PersistenceError> {
            keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(storage_err)
        };

        Ok(Self {
            objects: open("objects")?,
            attr_defs: open("attr_defs")?,
            meta: open("meta")?,
            player_index: open("player_index")?,
            channels: open("channels")?,
            channel_aliases: open("channel_aliases")?,
            mail: open("mail")?,
            _keyspace: keyspace,
            _tmpdir: tmpdir,
        })
    }
}

fn storage_err(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Storage(e.to_string())
}

fn encoding_err(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Encoding(e.to_string())
}

fn dbref_key(d: Dbref) -> [u8; 4] {
    d.id().to_be_bytes()
}

fn mail_key(player: Dbref, index: u32) -> Vec<u8> {
    let mut k = dbref_key(player).to_vec();
    k.extend_from_slice(&index.to_be_bytes());
    k
}

impl WorldPersistence for FjallPersistence {
    fn put_object(&self, obj: &Object) -> Result<(), PersistenceError> {
        let bytes = bincode::encode_to_vec(obj, BINCODE_CONFIG).map_err(encoding_err)?;
        self.objects
            .insert(dbref_key(obj.dbref), bytes)
            .map_err(storage_err)
    }

    fn put_attr_def(&self, def: &AttrDef) -> Result<(), PersistenceError> {
        let bytes = bincode::encode_to_vec(def, BINCODE_CONFIG).map_err(encoding_err)?;
        self.attr_defs
            .insert(def.num.to_be_bytes(), bytes)
            .map_err(storage_err)
    }

    fn put_meta(&self, meta: &WorldMeta) -> Result<(), PersistenceError> {
        let bytes = bincode::encode_to_vec(meta, BINCODE_CONFIG).map_err(encoding_err)?;
        self.meta.insert(META_KEY, bytes).map_err(storage_err)
    }

    fn update_player_index(
        &self,
        obj: &Object,
        old_name: Option<&str>,
    ) -> Result<(), PersistenceError> {
        if let Some(old) = old_name {
            for alias in old.split(';') {
                self.player_index
                    .remove(alias.trim().to_lowercase().as_bytes())
                    .map_err(storage_err)?;
            }
        }
        for alias in obj.aliases() {
            self.player_index
                .insert(
                    alias.trim().to_lowercase().as_bytes(),
                    dbref_key(obj.dbref),
                )
                .map_err(storage_err)?;
        }
        Ok(())
    }

    fn put_channel(&self, channel: &ChannelRecord) -> Result<(), PersistenceError> {
        let bytes = bincode::encode_to_vec(channel, BINCODE_CONFIG).map_err(encoding_err)?;
        self.channels
            .insert(channel.name.to_lowercase().as_bytes(), bytes)
            .map_err(storage_err)
    }

    fn delete_channel(&self, name: &str) -> Result<(), PersistenceError> {
        self.channels
            .remove(name.to_lowercase().as_bytes())
            .map_err(storage_err)
    }

    fn put_channel_alias(
        &self,
        player: Dbref,
        alias: &str,
        channel: &str,
    ) -> Result<(), PersistenceError> {
        let mut key = dbref_key(player).to_vec();
        key.extend_from_slice(alias.to_lowercase().as_bytes());
        self.channel_aliases
            .insert(key, channel.as_bytes())
            .map_err(storage_err)
    }

    fn delete_channel_alias(&self, player: Dbref, alias: &str) -> Result<(), PersistenceError> {
        let mut key = dbref_key(player).to_vec();
        key.extend_from_slice(alias.to_lowercase().as_bytes());
        self.channel_aliases.remove(key).map_err(storage_err)
    }

    fn put_mail(&self, mail: &MailRecord) -> Result<(), PersistenceError> {
        let bytes = bincode::encode_to_vec(mail, BINCODE_CONFIG).map_err(encoding_err)?;
        self.mail
            .insert(mail_key(mail.to, mail.index), bytes)
            .map_err(storage_err)
    }

    fn delete_mail(&self, player: Dbref, index: u32) -> Result<(), PersistenceError> {
        self.mail.remove(mail_key(player, index)).map_err(storage_err)
    }

    fn load_objects(&self) -> Result<Vec<Object>, PersistenceError> {
        let mut out = Vec::new();
        for kv in self.objects.iter() {
            let (_, v) = kv.map_err(storage_err)?;
            let (obj, _) =
                bincode::decode_from_slice::<Object, _>(&v, BINCODE_CONFIG).map_err(encoding_err)?;
            out.push(obj);
        }
        Ok(out)
    }

    fn load_attr_defs(&self) -> Result<Vec<AttrDef>, PersistenceError> {
        let mut out = Vec::new();
        for kv in self.attr_defs.iter() {
            let (_, v) = kv.map_err(storage_err)?;
            let (def, _) =
                bincode::decode_from_slice::<AttrDef, _>(&v, BINCODE_CONFIG).map_err(encoding_err)?;
            out.push(def);
        }
        Ok(out)
    }

    fn load_meta(&self) -> Result<Option<WorldMeta>, PersistenceError> {
        let Some(bytes) = self.meta.get(META_KEY).map_err(storage_err)? else {
            return Ok(None);
        };
        let (meta, _) =
            bincode::decode_from_slice::<WorldMeta, _>(&bytes, BINCODE_CONFIG).map_err(encoding_err)?;
        Ok(Some(meta))
    }

    fn close(&self) -> Result<(), PersistenceError> {
        self._keyspace
            .persist(fjall::PersistMode::SyncAll)
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::{GOD, ObjectKind};

    #[test]
    fn test_object_roundtrip() {
        let p = FjallPersistence::open(None).unwrap();
        let mut obj = Object::new(Dbref::mk_id(5), ObjectKind::Thing, "widget", GOD);
        obj.pennies = 42;
        p.put_object(&obj).unwrap();

        let loaded = p.load_objects().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].dbref, obj.dbref);
        assert_eq!(loaded[0].name, "widget");
        assert_eq!(loaded[0].pennies, 42);
    }

    #[test]
    fn test_meta_roundtrip() {
        let p = FjallPersistence::open(None).unwrap();
        assert!(p.load_meta().unwrap().is_none());
        p.put_meta(&WorldMeta {
            layout_version: 1,
            next_dbref: 77,
        })
        .unwrap();
        let meta = p.load_meta().unwrap().unwrap();
        assert_eq!(meta.next_dbref, 77);
    }

    #[test]
    fn test_attr_raw_prefix_survives_storage() {
        use marsh_common::attr::{A_DESC, AttrFlag, AttrValue};
        use marsh_common::util::BitEnum;

        let p = FjallPersistence::open(None).unwrap();
        let mut obj = Object::new(Dbref::mk_id(6), ObjectKind::Thing, "widget", GOD);
        obj.attrs.insert(
            A_DESC,
            AttrValue::new(Dbref::mk_id(3), BitEnum::new_with(AttrFlag::Visual), "seen"),
        );
        p.put_object(&obj).unwrap();
        let loaded = p.load_objects().unwrap();
        let v = loaded[0].attrs.get(&A_DESC).unwrap();
        assert_eq!(v.owner, Dbref::mk_id(3));
        assert!(v.flags.contains(AttrFlag::Visual));
        assert_eq!(v.text, "seen");
    }
}
