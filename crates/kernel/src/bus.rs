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

//! The event bus: typed world events fanned out to per-descriptor
//! subscribers and to global subscribers (durable logs, monitors).
//! Registration is mutexed; delivery to a closed subscriber is a no-op and
//! closed subscribers are swept lazily on the next emit.

use crate::sessions::Session;
use marsh_common::Dbref;
use marsh_common::events::{EventKind, WorldEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;
use uuid::Uuid;

/// A global subscriber sees every event whose kind it wants, regardless of
/// addressing.
pub trait EventSubscriber: Send + Sync {
    fn wants(&self, kind: EventKind) -> bool;
    fn deliver(&self, ev: &WorldEvent);
    fn closed(&self) -> bool {
        false
    }
}

struct DescriptorSub {
    descriptor: Uuid,
    player: Dbref,
    session: Arc<dyn Session>,
    closed: AtomicBool,
}

pub struct EventBus {
    descriptors: Mutex<Vec<DescriptorSub>>,
    globals: Mutex<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptors: Mutex::new(vec![]),
            globals: Mutex::new(vec![]),
        }
    }

    /// Subscribe a descriptor's session. Created on connect; the player
    /// binding arrives at login.
    pub fn attach(&self, descriptor: Uuid, session: Arc<dyn Session>) {
        self.descriptors.lock().unwrap().push(DescriptorSub {
            descriptor,
            player: marsh_common::NOTHING,
            session,
            closed: AtomicBool::new(false),
        });
    }

    pub fn bind_player(&self, descriptor: Uuid, player: Dbref) {
        for sub in self.descriptors.lock().unwrap().iter_mut() {
            if sub.descriptor == descriptor {
                sub.player = player;
            }
        }
    }

    /// Mark a descriptor's subscription closed. The entry is dropped on the
    /// next emit.
    pub fn detach(&self, descriptor: Uuid) {
        for sub in self.descriptors.lock().unwrap().iter() {
            if sub.descriptor == descriptor {
                sub.closed.store(true, Ordering::Relaxed);
            }
        }
    }

    pub fn subscribe_global(&self, sub: Arc<dyn EventSubscriber>) {
        self.globals.lock().unwrap().push(sub);
    }

    /// Per-player delivery: the event reaches every descriptor bound to
    /// `ev.target`, plus interested globals.
    pub fn emit(&self, ev: &WorldEvent) {
        if let Some(target) = ev.target {
            self.deliver_to_players(&[target], ev);
        } else {
            trace!(kind = ?ev.kind, "emit with no target, globals only");
            self.deliver_globals(ev);
        }
    }

    /// Fan an event out to a set of players (room broadcast resolved by the
    /// caller, which owns the graph).
    pub fn emit_to_players(&self, players: &[Dbref], ev: &WorldEvent) {
        self.deliver_to_players(players, ev);
    }

    fn deliver_to_players(&self, players: &[Dbref], ev: &WorldEvent) {
        {
            let mut subs = self.descriptors.lock().unwrap();
            subs.retain(|s| !s.closed.load(Ordering::Relaxed));
            for sub in subs.iter() {
                if !players.contains(&sub.player) {
                    continue;
                }
                if sub.session.send_event(ev).is_err() {
                    sub.closed.store(true, Ordering::Relaxed);
                }
            }
        }
        self.deliver_globals(ev);
    }

    fn deliver_globals(&self, ev: &WorldEvent) {
        let mut globals = self.globals.lock().unwrap();
        globals.retain(|g| !g.closed());
        for g in globals.iter() {
            if g.wants(ev.kind) {
                g.deliver(ev);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::MockSession;
    use std::sync::atomic::AtomicUsize;

    struct CountingSub {
        kind: EventKind,
        count: AtomicUsize,
    }

    impl EventSubscriber for CountingSub {
        fn wants(&self, kind: EventKind) -> bool {
            kind == self.kind
        }
        fn deliver(&self, _ev: &WorldEvent) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_per_player_delivery() {
        let bus = EventBus::new();
        let s1 = MockSession::new();
        let s2 = MockSession::new();
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();
        bus.attach(d1, s1.clone());
        bus.attach(d2, s2.clone());
        let p1 = Dbref::mk_id(5);
        let p2 = Dbref::mk_id(6);
        bus.bind_player(d1, p1);
        bus.bind_player(d2, p2);

        bus.emit(&WorldEvent::system(p1, "only for one"));
        assert_eq!(s1.lines(), vec!["only for one"]);
        assert!(s2.lines().is_empty());
    }

    #[test]
    fn test_detach_is_lazy_noop() {
        let bus = EventBus::new();
        let s = MockSession::new();
        let d = Uuid::new_v4();
        let p = Dbref::mk_id(5);
        bus.attach(d, s.clone());
        bus.bind_player(d, p);
        bus.detach(d);
        bus.emit(&WorldEvent::system(p, "after close"));
        assert!(s.lines().is_empty());
    }

    #[test]
    fn test_global_subscriber_filters_kind() {
        let bus = EventBus::new();
        let sub = Arc::new(CountingSub {
            kind: EventKind::Say,
            count: AtomicUsize::new(0),
        });
        bus.subscribe_global(sub.clone());
        let p = Dbref::mk_id(5);
        bus.emit_to_players(&[p], &WorldEvent::new(EventKind::Say, p, "hi"));
        bus.emit_to_players(&[p], &WorldEvent::new(EventKind::Pose, p, "waves"));
        assert_eq!(sub.count.load(Ordering::Relaxed), 1);
    }
}
