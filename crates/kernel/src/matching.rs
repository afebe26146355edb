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

//! Object matching: turning the names players type into dbrefs, relative to
//! where they stand. Resolution order: `me`, `here`, `#dbref`, `*player`,
//! then exact name/alias matches in inventory, location contents, and the
//! location's exits, then prefix matches over the same sets.

use crate::world::World;
use marsh_common::{AMBIGUOUS, Dbref, NOTHING};

/// Match `name` from `looker`'s point of view. Returns the dbref, or the
/// `NOTHING` / `AMBIGUOUS` sentinels.
#[must_use]
pub fn match_object(world: &World, looker: Dbref, name: &str) -> Dbref {
    let name = name.trim();
    if name.is_empty() {
        return NOTHING;
    }
    if name.eq_ignore_ascii_case("me") {
        return looker;
    }
    if name.eq_ignore_ascii_case("here") {
        return world.graph.get(looker).map(|o| o.location).unwrap_or(NOTHING);
    }
    if let Some(dbref) = Dbref::parse(name) {
        return if world.graph.contains(dbref) {
            dbref
        } else {
            NOTHING
        };
    }
    if let Some(player_name) = name.strip_prefix('*') {
        return world.graph.lookup_player(player_name).unwrap_or(NOTHING);
    }

    let location = world.graph.get(looker).map(|o| o.location).unwrap_or(NOTHING);
    let mut candidates: Vec<Dbref> = world.graph.contents_of(looker);
    if location.is_valid() {
        candidates.extend(world.graph.contents_of(location));
        candidates.extend(world.graph.exits_of(location));
    }
    candidates.retain(|d| *d != looker);

    pick(world, &candidates, name, false).or_else(|| pick(world, &candidates, name, true))
}

/// Match only among what `looker` carries.
#[must_use]
pub fn match_carried(world: &World, looker: Dbref, name: &str) -> Dbref {
    let candidates = world.graph.contents_of(looker);
    pick(world, &candidates, name, false).or_else(|| pick(world, &candidates, name, true))
}

/// Match only in the looker's location (contents, not exits).
#[must_use]
pub fn match_in_room(world: &World, looker: Dbref, name: &str) -> Dbref {
    let location = world.graph.get(looker).map(|o| o.location).unwrap_or(NOTHING);
    if !location.is_valid() {
        return NOTHING;
    }
    let mut candidates = world.graph.contents_of(location);
    candidates.retain(|d| *d != looker);
    pick(world, &candidates, name, false).or_else(|| pick(world, &candidates, name, true))
}

trait OrElse {
    fn or_else(self, f: impl FnOnce() -> Dbref) -> Dbref;
}

impl OrElse for Dbref {
    fn or_else(self, f: impl FnOnce() -> Dbref) -> Dbref {
        if self == NOTHING { f() } else { self }
    }
}

fn pick(world: &World, candidates: &[Dbref], name: &str, prefix: bool) -> Dbref {
    let mut hit = NOTHING;
    for d in candidates {
        let Some(obj) = world.graph.get(*d) else {
            continue;
        };
        if obj.is_going() || !obj.name_matches(name, prefix) {
            continue;
        }
        if hit != NOTHING && hit != *d {
            return AMBIGUOUS;
        }
        hit = *d;
    }
    hit
}

/// The user-visible complaint for a failed match, identical regardless of
/// why it failed beyond the ambiguity case.
#[must_use]
pub fn match_complaint(result: Dbref) -> Option<&'static str> {
    match result {
        NOTHING => Some("I don't see that here."),
        AMBIGUOUS => Some("I don't know which one you mean!"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::ObjectKind;

    fn fixture() -> (World, Dbref, Dbref, Dbref) {
        let mut w = World::scratch();
        let limbo = Dbref::mk_id(0);
        let p = w.graph.create_object(ObjectKind::Player, "Otter", NOTHING);
        w.graph.get_mut(p).unwrap().owner = p;
        w.graph.add_to_contents(p, limbo).unwrap();
        let rock = w.graph.create_object(ObjectKind::Thing, "rock", p);
        w.graph.add_to_contents(rock, limbo).unwrap();
        (w, limbo, p, rock)
    }

    #[test]
    fn test_me_here_dbref_star() {
        let (w, limbo, p, rock) = fixture();
        assert_eq!(match_object(&w, p, "me"), p);
        assert_eq!(match_object(&w, p, "here"), limbo);
        assert_eq!(match_object(&w, p, &format!("#{}", rock.id())), rock);
        assert_eq!(match_object(&w, p, "#9999"), NOTHING);
        assert_eq!(match_object(&w, p, "*otter"), p);
    }

    #[test]
    fn test_room_contents_and_prefix() {
        let (w, _limbo, p, rock) = fixture();
        assert_eq!(match_object(&w, p, "rock"), rock);
        assert_eq!(match_object(&w, p, "ro"), rock);
        assert_eq!(match_object(&w, p, "pebble"), NOTHING);
    }

    #[test]
    fn test_ambiguity() {
        let (mut w, limbo, p, rock) = fixture();
        let rocket = w.graph.create_object(ObjectKind::Thing, "rocket", p);
        w.graph.add_to_contents(rocket, limbo).unwrap();
        // "rock" exactly matches only the rock.
        assert_eq!(match_object(&w, p, "rock"), rock);
        // "roc" prefix-matches both.
        assert_eq!(match_object(&w, p, "roc"), AMBIGUOUS);
    }

    #[test]
    fn test_carried_only() {
        let (mut w, _limbo, p, rock) = fixture();
        assert_eq!(match_carried(&w, p, "rock"), NOTHING);
        w.graph.remove_from_contents(rock).unwrap();
        w.graph.add_to_contents(rock, p).unwrap();
        assert_eq!(match_carried(&w, p, "rock"), rock);
    }
}
