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

//! The world aggregate owned by the game-loop thread: graph, attribute
//! registry, persistence adapter, event bus, connection registry, config.
//! Construction happens once at startup, in dependency order; teardown in
//! reverse.

use crate::bus::EventBus;
use crate::config::Config;
use crate::login;
use crate::sessions::Connections;
use marsh_common::attr::{A_DESC, A_PASS};
use marsh_common::attr::AttrRegistry;
use marsh_common::events::WorldEvent;
use marsh_common::util::BitEnum;
use marsh_common::{DATA_LAYOUT_VERSION, Dbref, NOTHING, ObjFlag, ObjectKind};
use marsh_db::{NullPersistence, PersistenceError, WorldGraph, WorldMeta, WorldPersistence};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct World {
    pub graph: WorldGraph,
    pub registry: AttrRegistry,
    pub persistence: Arc<dyn WorldPersistence>,
    pub bus: Arc<EventBus>,
    pub conns: Arc<Connections>,
    pub config: Config,
    /// Per-player channel speak aliases, consulted by the dispatcher after
    /// the command table misses.
    pub channel_aliases: HashMap<(Dbref, String), String>,
}

impl World {
    /// Reconstitute the world from the adapter, seeding a minimal core when
    /// the store is empty.
    pub fn boot(
        config: Config,
        persistence: Arc<dyn WorldPersistence>,
        bus: Arc<EventBus>,
        conns: Arc<Connections>,
    ) -> Result<Self, PersistenceError> {
        let mut registry = AttrRegistry::new();
        for def in persistence.load_attr_defs()? {
            registry.restore(def);
        }

        let mut graph = WorldGraph::new();
        let loaded = persistence.load_objects()?;
        let count = loaded.len();
        for obj in loaded {
            graph.insert_loaded(obj);
        }
        if let Some(meta) = persistence.load_meta()? {
            graph.ensure_next_dbref(meta.next_dbref);
        }

        let mut world = Self {
            graph,
            registry,
            persistence,
            bus,
            conns,
            config,
            channel_aliases: HashMap::new(),
        };

        if world.graph.is_empty() {
            info!("Empty world store, seeding core objects");
            world.seed_core();
        } else {
            info!(objects = count, "World loaded");
        }
        Ok(world)
    }

    /// An in-memory world over the null adapter, seeded. The test fixture.
    #[must_use]
    pub fn scratch() -> Self {
        Self::boot(
            Config::default(),
            Arc::new(NullPersistence),
            Arc::new(EventBus::new()),
            Arc::new(Connections::new()),
        )
        .expect("null adapter cannot fail")
    }

    /// Room Zero, God, and the master room, in that dbref order.
    fn seed_core(&mut self) {
        let limbo = self.graph.create_object(ObjectKind::Room, "Limbo", NOTHING);
        let god = self.graph.create_object(ObjectKind::Player, "God", NOTHING);
        {
            let g = self.graph.get_mut(god).expect("just created");
            g.owner = god;
            g.flags.set(ObjFlag::Wizard);
            g.link = limbo;
            g.pennies = 1000;
        }
        {
            let l = self.graph.get_mut(limbo).expect("just created");
            l.owner = god;
            l.link = limbo;
        }
        self.graph
            .add_to_contents(god, limbo)
            .expect("seed placement cannot cycle");
        let master = self
            .graph
            .create_object(ObjectKind::Room, "Master Room", god);

        self.graph
            .set_attr_raw(
                god,
                A_PASS,
                login::hash_password("potrzebie"),
                god,
                BitEnum::new(),
            )
            .expect("seed attr");
        self.graph
            .set_attr(
                &self.registry,
                limbo,
                A_DESC,
                "You are in a featureless void.",
            )
            .expect("seed attr");

        self.persist_objs(&[limbo, god, master]);
        self.persist_meta();
        for def in self.registry.iter() {
            if let Err(e) = self.persistence.put_attr_def(def) {
                warn!(?e, "could not persist attribute definition");
            }
        }
        if let Some(g) = self.graph.get(god)
            && let Err(e) = self.persistence.update_player_index(g, None)
        {
            warn!(?e, "could not persist player index");
        }
    }

    #[must_use]
    pub fn channel_for(&self, player: Dbref, alias: &str) -> Option<&str> {
        self.channel_aliases
            .get(&(player, alias.to_lowercase()))
            .map(String::as_str)
    }

    #[must_use]
    pub fn master_room(&self) -> Dbref {
        Dbref::mk_id(self.config.master_room)
    }

    /// The display name, falling back to the dbref for dangling refs.
    #[must_use]
    pub fn name_of(&self, dbref: Dbref) -> String {
        match self.graph.get(dbref) {
            Some(o) => o.display_name().to_string(),
            None => dbref.to_string(),
        }
    }

    // ---------- durability ----------

    /// Write-through for one object. Failures are logged, never propagated:
    /// the in-memory graph is authoritative.
    pub fn persist_obj(&self, dbref: Dbref) {
        let Some(obj) = self.graph.get(dbref) else {
            return;
        };
        if let Err(e) = self.persistence.put_object(obj) {
            warn!(?dbref, ?e, "object write-through failed");
        }
    }

    pub fn persist_objs(&self, dbrefs: &[Dbref]) {
        let objs: Vec<_> = dbrefs.iter().filter_map(|d| self.graph.get(*d)).collect();
        if let Err(e) = self.persistence.put_objects(&objs) {
            warn!(?dbrefs, ?e, "object write-through failed");
        }
    }

    pub fn persist_meta(&self) {
        let meta = WorldMeta {
            layout_version: DATA_LAYOUT_VERSION,
            next_dbref: self.graph.next_dbref_hint(),
        };
        if let Err(e) = self.persistence.put_meta(&meta) {
            warn!(?e, "meta write-through failed");
        }
    }

    // ---------- output ----------

    /// One text line to one player, across all their descriptors.
    pub fn notify(&self, player: Dbref, text: impl Into<String>) {
        self.bus.emit(&WorldEvent::system(player, text));
    }

    /// Fan an event out to every connected player in `room`, minus the
    /// exclusions.
    pub fn emit_to_room_except(&self, room: Dbref, except: &[Dbref], ev: &WorldEvent) {
        let recipients: Vec<Dbref> = self
            .graph
            .contents_of(room)
            .into_iter()
            .filter(|d| {
                self.graph.get(*d).map(|o| o.kind) == Some(ObjectKind::Player)
                    && !except.contains(d)
                    && self.conns.is_connected(*d)
            })
            .collect();
        self.bus.emit_to_players(&recipients, ev);
    }

    pub fn emit_to_room(&self, room: Dbref, ev: &WorldEvent) {
        self.emit_to_room_except(room, &[], ev);
    }

    /// Room broadcast of a text line, minus exclusions.
    pub fn notify_room_except(&self, room: Dbref, except: &[Dbref], text: &str) {
        let ev = WorldEvent::new(marsh_common::events::EventKind::Emit, room, text).in_room(room);
        self.emit_to_room_except(room, except, &ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::GOD;

    #[test]
    fn test_seeded_core() {
        let w = World::scratch();
        let limbo = Dbref::mk_id(0);
        assert_eq!(w.graph.get(limbo).unwrap().kind, ObjectKind::Room);
        let god = w.graph.get(GOD).unwrap();
        assert_eq!(god.kind, ObjectKind::Player);
        assert!(god.is_wizard());
        assert_eq!(god.location, limbo);
        assert_eq!(w.graph.lookup_player("god"), Some(GOD));
        assert_eq!(w.master_room(), Dbref::mk_id(2));
        assert!(w.graph.attr_text_direct(GOD, A_PASS).is_some());
    }

    #[test]
    fn test_name_of_dangling() {
        let w = World::scratch();
        assert_eq!(w.name_of(Dbref::mk_id(999)), "#999");
        assert_eq!(w.name_of(GOD), "God");
    }
}
