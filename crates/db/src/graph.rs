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
use ahash::AHasher;
use marsh_common::attr::{AttrRegistry, AttrValue};
use marsh_common::util::BitEnum;
use marsh_common::{Dbref, NOTHING, ObjFlag, ObjectKind, WorldError};
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;
use tracing::warn;

/// Maximum depth of the attribute-inheritance parent walk.
pub const PARENT_DEPTH_LIMIT: usize = 10;

/// The object arena. Dbrefs index everything; the chains
/// (`contents`/`next`, `exits`/`next`) live inside the objects themselves.
pub struct WorldGraph {
    objects: HashMap<Dbref, Object, BuildHasherDefault<AHasher>>,
    /// Monotonic allocator, seeded above max-live at load.
    next_dbref: i32,
    /// Garbage slots available for reuse.
    free_list: Vec<Dbref>,
    /// Lowercased player name (and alias) → dbref, for login and `*name`.
    player_names: HashMap<String, Dbref>,
}

impl WorldGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Default::default(),
            next_dbref: 0,
            free_list: Vec::new(),
            player_names: Default::default(),
        }
    }

    #[must_use]
    pub fn get(&self, dbref: Dbref) -> Option<&Object> {
        self.objects.get(&dbref)
    }

    pub fn get_mut(&mut self, dbref: Dbref) -> Option<&mut Object> {
        self.objects.get_mut(&dbref)
    }

    pub fn obj(&self, dbref: Dbref) -> Result<&Object, WorldError> {
        self.objects
            .get(&dbref)
            .ok_or(WorldError::ObjectNotFound(dbref))
    }

    pub fn obj_mut(&mut self, dbref: Dbref) -> Result<&mut Object, WorldError> {
        self.objects
            .get_mut(&dbref)
            .ok_or(WorldError::ObjectNotFound(dbref))
    }

    #[must_use]
    pub fn contains(&self, dbref: Dbref) -> bool {
        self.objects.contains_key(&dbref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Keep the dbref allocator at or above `at_least` (restored metadata
    /// can run ahead of max-live).
    pub fn ensure_next_dbref(&mut self, at_least: i32) {
        if at_least > self.next_dbref {
            self.next_dbref = at_least;
        }
    }

    /// The allocator position, for metadata write-through.
    #[must_use]
    pub fn next_dbref_hint(&self) -> i32 {
        self.next_dbref
    }

    /// Install an object loaded from the persistence adapter, keeping the
    /// dbref allocator ahead of everything seen and the player index warm.
    pub fn insert_loaded(&mut self, obj: Object) {
        if obj.dbref.id() >= self.next_dbref {
            self.next_dbref = obj.dbref.id() + 1;
        }
        match obj.kind {
            ObjectKind::Player => self.index_player_names(&obj),
            ObjectKind::Garbage => self.free_list.push(obj.dbref),
            _ => {}
        }
        self.objects.insert(obj.dbref, obj);
    }

    /// Create a fresh object, reusing a garbage slot when one is free. New
    /// objects start detached (`location == NOTHING`); placement is a
    /// separate, explicit step.
    pub fn create_object(
        &mut self,
        kind: ObjectKind,
        name: impl Into<String>,
        owner: Dbref,
    ) -> Dbref {
        let dbref = match self.free_list.pop() {
            Some(d) => d,
            None => {
                let d = Dbref::mk_id(self.next_dbref);
                self.next_dbref += 1;
                d
            }
        };
        let obj = Object::new(dbref, kind, name, owner);
        if kind == ObjectKind::Player {
            self.index_player_names(&obj);
        }
        self.objects.insert(dbref, obj);
        dbref
    }

    // ---------- contents & exit chains ----------

    /// Walk the `contents`/`next` chain rooted at `container`. Guarded: a
    /// repeated dbref or a self-reference terminates the walk.
    #[must_use]
    pub fn contents_of(&self, container: Dbref) -> Vec<Dbref> {
        let head = self.get(container).map(|o| o.contents).unwrap_or(NOTHING);
        self.walk_chain(container, head, |o| o.next)
    }

    /// Walk the exit chain of a room.
    #[must_use]
    pub fn exits_of(&self, room: Dbref) -> Vec<Dbref> {
        let head = self.get(room).map(|o| o.exits).unwrap_or(NOTHING);
        self.walk_chain(room, head, |o| o.next)
    }

    fn walk_chain(&self, root: Dbref, head: Dbref, next: impl Fn(&Object) -> Dbref) -> Vec<Dbref> {
        let mut seen: HashSet<Dbref> = HashSet::new();
        let mut out = Vec::new();
        let mut cur = head;
        while cur.is_valid() {
            if cur == root || !seen.insert(cur) {
                warn!(?root, ?cur, "chain corruption detected, truncating walk");
                break;
            }
            let Some(obj) = self.get(cur) else {
                warn!(?root, ?cur, "dangling chain entry, truncating walk");
                break;
            };
            out.push(cur);
            cur = next(obj);
        }
        out
    }

    /// True if placing `obj` inside `dest` would put a container inside
    /// itself, directly or transitively.
    #[must_use]
    pub fn would_create_cycle(&self, obj: Dbref, dest: Dbref) -> bool {
        let mut seen: HashSet<Dbref> = HashSet::new();
        let mut cur = dest;
        while cur.is_valid() {
            if cur == obj {
                return true;
            }
            if !seen.insert(cur) {
                return false;
            }
            cur = self.get(cur).map(|o| o.location).unwrap_or(NOTHING);
        }
        false
    }

    /// Push `obj` onto the front of `dest`'s contents chain and point its
    /// location there. A no-op when the object is already in the chain, so
    /// repeated inserts cannot duplicate it.
    pub fn add_to_contents(&mut self, obj: Dbref, dest: Dbref) -> Result<(), WorldError> {
        if obj == dest {
            return Err(WorldError::ContainmentCycle(obj, dest));
        }
        if self.contents_of(dest).contains(&obj) {
            self.obj_mut(obj)?.location = dest;
            return Ok(());
        }
        let head = self.obj(dest)?.contents;
        {
            let o = self.obj_mut(obj)?;
            o.next = head;
            o.location = dest;
        }
        self.obj_mut(dest)?.contents = obj;
        Ok(())
    }

    /// Unlink `obj` from its location's contents chain. The location field
    /// is left for the caller to reassign.
    pub fn remove_from_contents(&mut self, obj: Dbref) -> Result<(), WorldError> {
        let loc = self.obj(obj)?.location;
        if !loc.is_valid() {
            return Ok(());
        }
        let chain = self.contents_of(loc);
        let Some(pos) = chain.iter().position(|d| *d == obj) else {
            self.obj_mut(obj)?.next = NOTHING;
            return Ok(());
        };
        let after = self.obj(obj)?.next;
        if pos == 0 {
            self.obj_mut(loc)?.contents = after;
        } else {
            self.obj_mut(chain[pos - 1])?.next = after;
        }
        self.obj_mut(obj)?.next = NOTHING;
        Ok(())
    }

    /// Attach an exit to a room's exit chain. The exit's `exits` field
    /// records the source room; its `location` holds the destination.
    pub fn add_exit(&mut self, exit: Dbref, room: Dbref) -> Result<(), WorldError> {
        if self.exits_of(room).contains(&exit) {
            self.obj_mut(exit)?.exits = room;
            return Ok(());
        }
        let head = self.obj(room)?.exits;
        {
            let e = self.obj_mut(exit)?;
            e.next = head;
            e.exits = room;
        }
        self.obj_mut(room)?.exits = exit;
        Ok(())
    }

    pub fn remove_exit(&mut self, exit: Dbref) -> Result<(), WorldError> {
        let room = self.obj(exit)?.exits;
        if !room.is_valid() {
            return Ok(());
        }
        let chain = self.exits_of(room);
        let Some(pos) = chain.iter().position(|d| *d == exit) else {
            self.obj_mut(exit)?.next = NOTHING;
            return Ok(());
        };
        let after = self.obj(exit)?.next;
        if pos == 0 {
            self.obj_mut(room)?.exits = after;
        } else {
            self.obj_mut(chain[pos - 1])?.next = after;
        }
        let e = self.obj_mut(exit)?;
        e.next = NOTHING;
        e.exits = NOTHING;
        Ok(())
    }

    /// Flatten known self-references left by corruption: an object whose
    /// `next` points at itself, or a container whose contents head is the
    /// container.
    pub fn repair_chains(&mut self, container: Dbref) {
        let fixes: Vec<Dbref> = self
            .contents_of(container)
            .into_iter()
            .chain(self.exits_of(container))
            .collect();
        if let Some(c) = self.get_mut(container) {
            if c.contents == container {
                c.contents = NOTHING;
            }
            if c.exits == container {
                c.exits = NOTHING;
            }
        }
        for d in fixes {
            if let Some(o) = self.get_mut(d)
                && o.next == d
            {
                o.next = NOTHING;
            }
        }
    }

    // ---------- parent chain ----------

    /// The object followed by its parents, cycle-guarded and capped at
    /// [`PARENT_DEPTH_LIMIT`] levels.
    #[must_use]
    pub fn parent_chain(&self, obj: Dbref) -> Vec<Dbref> {
        let mut seen: HashSet<Dbref> = HashSet::new();
        let mut out = Vec::new();
        let mut cur = obj;
        while cur.is_valid() && out.len() <= PARENT_DEPTH_LIMIT {
            if !seen.insert(cur) {
                break;
            }
            let Some(o) = self.get(cur) else { break };
            out.push(cur);
            cur = o.parent;
        }
        out
    }

    // ---------- player name index ----------

    fn index_player_names(&mut self, obj: &Object) {
        for alias in obj.aliases() {
            self.player_names
                .insert(alias.trim().to_lowercase(), obj.dbref);
        }
    }

    /// Re-index a player after a rename. `old_name` is the full previous
    /// name-with-aliases string.
    pub fn reindex_player(&mut self, player: Dbref, old_name: &str) {
        for alias in old_name.split(';') {
            let key = alias.trim().to_lowercase();
            if self.player_names.get(&key) == Some(&player) {
                self.player_names.remove(&key);
            }
        }
        if let Some(obj) = self.objects.get(&player) {
            let obj = obj.clone();
            self.index_player_names(&obj);
        }
    }

    #[must_use]
    pub fn lookup_player(&self, name: &str) -> Option<Dbref> {
        self.player_names.get(&name.trim().to_lowercase()).copied()
    }

    // ---------- destroy lifecycle ----------

    /// First phase of `@destroy`: flag the object Going. The tick loop
    /// finalizes Going objects into Garbage.
    pub fn mark_going(&mut self, obj: Dbref) -> Result<(), WorldError> {
        self.obj_mut(obj)?.flags.set(ObjFlag::Going);
        Ok(())
    }

    /// Finalize every Going object: relocate contents to their home (or the
    /// owner as a fallback), detach from all chains, drop attributes, and
    /// turn the record into reusable Garbage. Returns the collected dbrefs.
    pub fn collect_garbage(&mut self) -> Vec<Dbref> {
        let going: Vec<Dbref> = self
            .objects
            .values()
            .filter(|o| o.is_going() && o.kind != ObjectKind::Garbage)
            .map(|o| o.dbref)
            .collect();

        // A destroyed room takes its exits with it.
        for room in &going {
            if self.get(*room).map(|o| o.kind) == Some(ObjectKind::Room) {
                for exit in self.exits_of(*room) {
                    if let Some(e) = self.get_mut(exit) {
                        e.flags.set(ObjFlag::Going);
                    }
                }
            }
        }
        let going: Vec<Dbref> = self
            .objects
            .values()
            .filter(|o| o.is_going() && o.kind != ObjectKind::Garbage)
            .map(|o| o.dbref)
            .collect();

        for dbref in &going {
            let (kind, name, contents) = {
                let Some(o) = self.get(*dbref) else { continue };
                (o.kind, o.name.clone(), self.contents_of(*dbref))
            };

            // Relocate erstwhile contents to their home, falling back to
            // their owner's inventory.
            for item in contents {
                let (home, item_owner) = self
                    .get(item)
                    .map(|o| (o.link, o.owner))
                    .unwrap_or((NOTHING, NOTHING));
                let dest = if home.is_valid() && self.contains(home) && !going.contains(&home) {
                    home
                } else {
                    item_owner
                };
                let _ = self.remove_from_contents(item);
                if dest.is_valid() && self.contains(dest) && !going.contains(&dest) {
                    let _ = self.add_to_contents(item, dest);
                } else if let Some(o) = self.get_mut(item) {
                    o.location = NOTHING;
                }
            }

            match kind {
                ObjectKind::Exit => {
                    let _ = self.remove_exit(*dbref);
                }
                ObjectKind::Player => {
                    for alias in name.split(';') {
                        let key = alias.trim().to_lowercase();
                        if self.player_names.get(&key) == Some(dbref) {
                            self.player_names.remove(&key);
                        }
                    }
                    let _ = self.remove_from_contents(*dbref);
                }
                _ => {
                    let _ = self.remove_from_contents(*dbref);
                }
            }

            let Some(o) = self.get_mut(*dbref) else {
                continue;
            };
            o.kind = ObjectKind::Garbage;
            o.name = "Garbage".to_string();
            o.location = NOTHING;
            o.contents = NOTHING;
            o.next = NOTHING;
            o.exits = NOTHING;
            o.link = NOTHING;
            o.parent = NOTHING;
            o.zone = NOTHING;
            o.flags = BitEnum::new();
            o.powers = BitEnum::new();
            o.pennies = 0;
            o.attrs.clear();
            self.free_list.push(*dbref);
        }
        going
    }

    // ---------- attributes ----------

    #[must_use]
    pub fn attr_direct(&self, obj: Dbref, num: u16) -> Option<&AttrValue> {
        self.get(obj)?.attrs.get(&num)
    }

    /// `GetAttrTextDirect`: the stored text with no parent walk.
    #[must_use]
    pub fn attr_text_direct(&self, obj: Dbref, num: u16) -> Option<String> {
        self.attr_direct(obj, num).map(|v| v.text.clone())
    }

    /// Find the attribute on the object or the nearest parent carrying it,
    /// honoring the Private definition flag (not inherited) and the parent
    /// depth cap. Returns the carrying object and the value.
    #[must_use]
    pub fn attr_with_source(
        &self,
        registry: &AttrRegistry,
        obj: Dbref,
        num: u16,
    ) -> Option<(Dbref, &AttrValue)> {
        let private = registry
            .get(num)
            .is_some_and(|d| d.flags.contains(marsh_common::attr::AttrFlag::Private));
        if private {
            return self.attr_direct(obj, num).map(|v| (obj, v));
        }
        for ancestor in self.parent_chain(obj) {
            if let Some(v) = self.attr_direct(ancestor, num) {
                return Some((ancestor, v));
            }
        }
        None
    }

    /// `GetAttrText`: parent-walking fetch of the attribute text.
    #[must_use]
    pub fn attr_text(&self, registry: &AttrRegistry, obj: Dbref, num: u16) -> Option<String> {
        self.attr_with_source(registry, obj, num)
            .map(|(_, v)| v.text.clone())
    }

    /// `SetAttr`: store text, preserving per-instance flags and owner on an
    /// existing value. On first set, a definition carrying Propagate copies
    /// owner and instance flags down from the nearest parent that has the
    /// attribute; otherwise the value is owned by the object's owner with no
    /// instance flags.
    pub fn set_attr(
        &mut self,
        registry: &AttrRegistry,
        obj: Dbref,
        num: u16,
        text: impl Into<String>,
    ) -> Result<(), WorldError> {
        let text = text.into();
        if let Some(existing) = self.obj(obj)?.attrs.get(&num) {
            let (owner, flags) = (existing.owner, existing.flags);
            self.obj_mut(obj)?
                .attrs
                .insert(num, AttrValue::new(owner, flags, text));
            return Ok(());
        }
        let propagate = registry
            .get(num)
            .is_some_and(|d| d.flags.contains(marsh_common::attr::AttrFlag::Propagate));
        let (owner, flags) = if propagate {
            match self
                .parent_chain(obj)
                .into_iter()
                .skip(1)
                .find_map(|p| self.attr_direct(p, num))
            {
                Some(v) => (v.owner, v.flags),
                None => (self.obj(obj)?.owner, BitEnum::new()),
            }
        } else {
            (self.obj(obj)?.owner, BitEnum::new())
        };
        self.obj_mut(obj)?
            .attrs
            .insert(num, AttrValue::new(owner, flags, text));
        Ok(())
    }

    /// `SetAttrRaw`: explicit owner and flags.
    pub fn set_attr_raw(
        &mut self,
        obj: Dbref,
        num: u16,
        text: impl Into<String>,
        owner: Dbref,
        flags: BitEnum<marsh_common::attr::AttrFlag>,
    ) -> Result<(), WorldError> {
        self.obj_mut(obj)?
            .attrs
            .insert(num, AttrValue::new(owner, flags, text.into()));
        Ok(())
    }

    pub fn clear_attr(&mut self, obj: Dbref, num: u16) -> Result<(), WorldError> {
        self.obj_mut(obj)?.attrs.remove(&num);
        Ok(())
    }
}

impl Default for WorldGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::attr::{A_DESC, AttrFlag};
    use marsh_common::GOD;
    use pretty_assertions::assert_eq;

    fn world_with_room() -> (WorldGraph, Dbref) {
        let mut g = WorldGraph::new();
        let god = g.create_object(ObjectKind::Player, "God", NOTHING);
        assert_eq!(god, Dbref::mk_id(0));
        let room = g.create_object(ObjectKind::Room, "Limbo", god);
        (g, room)
    }

    #[test]
    fn test_contents_exactly_once() {
        let (mut g, room) = world_with_room();
        let a = g.create_object(ObjectKind::Thing, "a", GOD);
        let b = g.create_object(ObjectKind::Thing, "b", GOD);
        g.add_to_contents(a, room).unwrap();
        g.add_to_contents(b, room).unwrap();
        // Re-adding must not duplicate.
        g.add_to_contents(a, room).unwrap();
        let contents = g.contents_of(room);
        assert_eq!(contents.iter().filter(|d| **d == a).count(), 1);
        assert_eq!(contents.iter().filter(|d| **d == b).count(), 1);
        assert_eq!(contents.len(), 2);
    }

    #[test]
    fn test_remove_relinks_chain() {
        let (mut g, room) = world_with_room();
        let a = g.create_object(ObjectKind::Thing, "a", GOD);
        let b = g.create_object(ObjectKind::Thing, "b", GOD);
        let c = g.create_object(ObjectKind::Thing, "c", GOD);
        for d in [a, b, c] {
            g.add_to_contents(d, room).unwrap();
        }
        g.remove_from_contents(b).unwrap();
        let contents = g.contents_of(room);
        assert!(contents.contains(&a) && contents.contains(&c));
        assert!(!contents.contains(&b));
        assert_eq!(contents.len(), 2);
    }

    #[test]
    fn test_cycle_guard_on_corrupt_next() {
        let (mut g, room) = world_with_room();
        let a = g.create_object(ObjectKind::Thing, "a", GOD);
        g.add_to_contents(a, room).unwrap();
        // Corrupt: a's next points at itself.
        g.get_mut(a).unwrap().next = a;
        let contents = g.contents_of(room);
        assert_eq!(contents, vec![a]);
        g.repair_chains(room);
        assert_eq!(g.get(a).unwrap().next, NOTHING);
    }

    #[test]
    fn test_would_create_cycle() {
        let (mut g, room) = world_with_room();
        let bag = g.create_object(ObjectKind::Thing, "bag", GOD);
        let box_ = g.create_object(ObjectKind::Thing, "box", GOD);
        g.add_to_contents(bag, room).unwrap();
        g.add_to_contents(box_, bag).unwrap();
        assert!(g.would_create_cycle(bag, box_));
        assert!(g.would_create_cycle(bag, bag));
        assert!(!g.would_create_cycle(box_, room));
    }

    #[test]
    fn test_exit_chain() {
        let (mut g, room) = world_with_room();
        let r2 = g.create_object(ObjectKind::Room, "Annex", GOD);
        let n = g.create_object(ObjectKind::Exit, "North;n", GOD);
        g.get_mut(n).unwrap().location = r2;
        g.add_exit(n, room).unwrap();
        assert_eq!(g.exits_of(room), vec![n]);
        assert_eq!(g.get(n).unwrap().exits, room);
        g.remove_exit(n).unwrap();
        assert!(g.exits_of(room).is_empty());
    }

    #[test]
    fn test_parent_chain_depth_cap() {
        let mut g = WorldGraph::new();
        let mut prev = NOTHING;
        let mut first = NOTHING;
        for i in 0..20 {
            let o = g.create_object(ObjectKind::Thing, format!("t{i}"), GOD);
            if i == 0 {
                first = o;
            }
            if prev.is_valid() {
                g.get_mut(prev).unwrap().parent = o;
            }
            prev = o;
        }
        let chain = g.parent_chain(first);
        assert_eq!(chain.len(), PARENT_DEPTH_LIMIT + 1);
    }

    #[test]
    fn test_parent_chain_cycle_guard() {
        let mut g = WorldGraph::new();
        let a = g.create_object(ObjectKind::Thing, "a", GOD);
        let b = g.create_object(ObjectKind::Thing, "b", GOD);
        g.get_mut(a).unwrap().parent = b;
        g.get_mut(b).unwrap().parent = a;
        assert_eq!(g.parent_chain(a), vec![a, b]);
    }

    #[test]
    fn test_attr_set_get_preserves_instance_flags() {
        let (mut g, room) = world_with_room();
        let reg = AttrRegistry::new();
        g.set_attr_raw(
            room,
            A_DESC,
            "old",
            Dbref::mk_id(7),
            BitEnum::new_with(AttrFlag::NoClone),
        )
        .unwrap();
        g.set_attr(&reg, room, A_DESC, "new").unwrap();
        let v = g.attr_direct(room, A_DESC).unwrap();
        assert_eq!(v.text, "new");
        assert_eq!(v.owner, Dbref::mk_id(7));
        assert!(v.flags.contains(AttrFlag::NoClone));
    }

    #[test]
    fn test_attr_parent_walk() {
        let (mut g, room) = world_with_room();
        let reg = AttrRegistry::new();
        let child = g.create_object(ObjectKind::Thing, "child", GOD);
        g.get_mut(child).unwrap().parent = room;
        g.set_attr(&reg, room, A_DESC, "inherited").unwrap();
        assert_eq!(
            g.attr_text(&reg, child, A_DESC),
            Some("inherited".to_string())
        );
        assert_eq!(g.attr_text_direct(child, A_DESC), None);
    }

    #[test]
    fn test_propagate_copies_owner_from_parent() {
        let mut g = WorldGraph::new();
        let mut reg = AttrRegistry::new();
        let parent = g.create_object(ObjectKind::Thing, "parent", GOD);
        let child = g.create_object(ObjectKind::Thing, "child", GOD);
        g.get_mut(child).unwrap().parent = parent;

        let num = reg.resolve_or_define("HERITAGE");
        // Make the definition propagate.
        let mut flags = BitEnum::new();
        flags.set(AttrFlag::Propagate);
        reg.restore(marsh_common::attr::AttrDef::new(num, "HERITAGE", flags));

        g.set_attr_raw(
            parent,
            num,
            "root value",
            Dbref::mk_id(9),
            BitEnum::new_with(AttrFlag::Visual),
        )
        .unwrap();
        g.set_attr(&reg, child, num, "child value").unwrap();
        let v = g.attr_direct(child, num).unwrap();
        assert_eq!(v.owner, Dbref::mk_id(9));
        assert!(v.flags.contains(AttrFlag::Visual));
    }

    #[test]
    fn test_destroy_to_garbage_and_reuse() {
        let (mut g, room) = world_with_room();
        let thing = g.create_object(ObjectKind::Thing, "doomed", GOD);
        let keep = g.create_object(ObjectKind::Thing, "kept", GOD);
        g.add_to_contents(thing, room).unwrap();
        g.add_to_contents(keep, thing).unwrap();
        g.get_mut(keep).unwrap().link = room;

        g.mark_going(thing).unwrap();
        let collected = g.collect_garbage();
        assert_eq!(collected, vec![thing]);
        assert_eq!(g.get(thing).unwrap().kind, ObjectKind::Garbage);
        // Contents went home.
        assert_eq!(g.get(keep).unwrap().location, room);
        assert!(g.contents_of(room).contains(&keep));
        // The slot is reused by the next create.
        let fresh = g.create_object(ObjectKind::Thing, "fresh", GOD);
        assert_eq!(fresh, thing);
    }

    #[test]
    fn test_player_index() {
        let mut g = WorldGraph::new();
        let p = g.create_object(ObjectKind::Player, "Otter;ott", NOTHING);
        assert_eq!(g.lookup_player("otter"), Some(p));
        assert_eq!(g.lookup_player("OTT"), Some(p));
        let old = g.get(p).unwrap().name.clone();
        g.get_mut(p).unwrap().name = "Weasel".to_string();
        g.reindex_player(p, &old);
        assert_eq!(g.lookup_player("otter"), None);
        assert_eq!(g.lookup_player("weasel"), Some(p));
    }
}
