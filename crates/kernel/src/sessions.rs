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

//! Descriptor bookkeeping: the per-connection state machine, the
//! thread-safe registry of live descriptors, and the session trait the
//! transports implement.

use marsh_common::Dbref;
use marsh_common::events::WorldEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
    #[error("Could not deliver to session")]
    DeliveryError,
}

/// The output half of a connection, implemented by each transport. Writes
/// are buffered transport-side and flushed by I/O threads; these calls never
/// block the game loop.
pub trait Session: Send + Sync {
    /// Deliver a world event. Stream transports print `text`; structured
    /// transports forward the whole record.
    fn send_event(&self, ev: &WorldEvent) -> Result<(), SessionError>;

    /// Send a bare text line outside the event stream (login prompts,
    /// system notices).
    fn send_line(&self, line: &str) -> Result<(), SessionError>;

    /// Ask the transport to close this connection.
    fn disconnect(&self) -> Result<(), SessionError>;
}

/// Lifecycle of one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    Login,
    Connected,
    Closed,
}

/// What kind of transport is on the other end. Text is transmitted as-is
/// except where the transport performs markup translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    StreamLine,
    RichHtml,
    StructuredWs,
}

/// Capture-next-line state set by `@program`: the next input line from any
/// of the player's descriptors is fed as `%0` to this attribute.
#[derive(Debug, Clone)]
pub struct ProgramCapture {
    /// Object the captured attribute lives on.
    pub obj: Dbref,
    pub attr: u16,
    /// Register snapshot restored when the capture fires.
    pub registers: Vec<String>,
}

pub struct Descriptor {
    pub id: Uuid,
    pub player: Dbref,
    pub state: DescriptorState,
    pub transport: TransportKind,
    pub peer_addr: String,
    pub connected_at: Instant,
    pub last_activity: Instant,
    /// Dark was set at connect time (`cd`) and clears on first input.
    pub auto_dark: bool,
    pub failed_logins: u32,
    pub session: Arc<dyn Session>,
}

/// Point-in-time copy for WHO listings and idle sweeps. Enumeration always
/// returns snapshots; callers never hold the registry lock.
#[derive(Clone)]
pub struct DescriptorInfo {
    pub id: Uuid,
    pub player: Dbref,
    pub state: DescriptorState,
    pub transport: TransportKind,
    pub peer_addr: String,
    pub connected_at: Instant,
    pub last_activity: Instant,
}

/// The descriptor table. Internally mutexed; shared between I/O threads and
/// the game loop.
pub struct Connections {
    descriptors: RwLock<HashMap<Uuid, Descriptor>>,
    /// Capture state is per-player, which is what makes set/clear atomic
    /// across all of a player's descriptors.
    captures: RwLock<HashMap<Dbref, ProgramCapture>>,
}

impl Connections {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            captures: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fresh connection in the Login state. Returns its id.
    pub fn new_connection(
        &self,
        transport: TransportKind,
        peer_addr: impl Into<String>,
        session: Arc<dyn Session>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Instant::now();
        let desc = Descriptor {
            id,
            player: marsh_common::NOTHING,
            state: DescriptorState::Login,
            transport,
            peer_addr: peer_addr.into(),
            connected_at: now,
            last_activity: now,
            auto_dark: false,
            failed_logins: 0,
            session,
        };
        self.descriptors.write().unwrap().insert(id, desc);
        id
    }

    /// Transition a descriptor to Connected as the given player.
    pub fn login_complete(&self, id: Uuid, player: Dbref, auto_dark: bool) {
        if let Some(d) = self.descriptors.write().unwrap().get_mut(&id) {
            d.player = player;
            d.state = DescriptorState::Connected;
            d.auto_dark = auto_dark;
        }
    }

    /// Switch the recorded transport kind (pueblo upgrade).
    pub fn set_transport(&self, id: Uuid, transport: TransportKind) {
        if let Some(d) = self.descriptors.write().unwrap().get_mut(&id) {
            d.transport = transport;
        }
    }

    /// Record a failed credential attempt; returns the new count.
    pub fn login_failed(&self, id: Uuid) -> u32 {
        let mut w = self.descriptors.write().unwrap();
        match w.get_mut(&id) {
            Some(d) => {
                d.failed_logins += 1;
                d.failed_logins
            }
            None => 0,
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<DescriptorInfo> {
        let mut removed = self.descriptors.write().unwrap().remove(&id)?;
        removed.state = DescriptorState::Closed;
        Some(info_of(&removed))
    }

    pub fn touch(&self, id: Uuid) {
        if let Some(d) = self.descriptors.write().unwrap().get_mut(&id) {
            d.last_activity = Instant::now();
        }
    }

    /// Clear the auto-dark marker on this descriptor (first non-empty
    /// input). Returns true if it was set.
    pub fn clear_auto_dark(&self, id: Uuid) -> bool {
        let mut w = self.descriptors.write().unwrap();
        match w.get_mut(&id) {
            Some(d) if d.auto_dark => {
                d.auto_dark = false;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn get_info(&self, id: Uuid) -> Option<DescriptorInfo> {
        self.descriptors.read().unwrap().get(&id).map(info_of)
    }

    #[must_use]
    pub fn session_of(&self, id: Uuid) -> Option<Arc<dyn Session>> {
        self.descriptors
            .read()
            .unwrap()
            .get(&id)
            .map(|d| d.session.clone())
    }

    #[must_use]
    pub fn player_of(&self, id: Uuid) -> Option<Dbref> {
        let r = self.descriptors.read().unwrap();
        let d = r.get(&id)?;
        (d.state == DescriptorState::Connected).then_some(d.player)
    }

    #[must_use]
    pub fn descriptors_for(&self, player: Dbref) -> Vec<Uuid> {
        self.descriptors
            .read()
            .unwrap()
            .values()
            .filter(|d| d.state == DescriptorState::Connected && d.player == player)
            .map(|d| d.id)
            .collect()
    }

    #[must_use]
    pub fn sessions_for(&self, player: Dbref) -> Vec<Arc<dyn Session>> {
        self.descriptors
            .read()
            .unwrap()
            .values()
            .filter(|d| d.state == DescriptorState::Connected && d.player == player)
            .map(|d| d.session.clone())
            .collect()
    }

    /// The set of distinct players with at least one Connected descriptor.
    #[must_use]
    pub fn connected_players(&self) -> Vec<Dbref> {
        let mut players: Vec<Dbref> = self
            .descriptors
            .read()
            .unwrap()
            .values()
            .filter(|d| d.state == DescriptorState::Connected)
            .map(|d| d.player)
            .collect();
        players.sort();
        players.dedup();
        players
    }

    #[must_use]
    pub fn is_connected(&self, player: Dbref) -> bool {
        self.descriptors
            .read()
            .unwrap()
            .values()
            .any(|d| d.state == DescriptorState::Connected && d.player == player)
    }

    /// Idle time of the *least* idle of the player's descriptors.
    #[must_use]
    pub fn idle_time(&self, player: Dbref) -> Option<Duration> {
        self.descriptors
            .read()
            .unwrap()
            .values()
            .filter(|d| d.state == DescriptorState::Connected && d.player == player)
            .map(|d| d.last_activity.elapsed())
            .min()
    }

    /// Age of the *longest* connected of the player's descriptors.
    #[must_use]
    pub fn conn_time(&self, player: Dbref) -> Option<Duration> {
        self.descriptors
            .read()
            .unwrap()
            .values()
            .filter(|d| d.state == DescriptorState::Connected && d.player == player)
            .map(|d| d.connected_at.elapsed())
            .max()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<DescriptorInfo> {
        self.descriptors.read().unwrap().values().map(info_of).collect()
    }

    /// Descriptors idle past `timeout`, for the forcible-close sweep.
    #[must_use]
    pub fn idle_past(&self, timeout: Duration) -> Vec<Uuid> {
        self.descriptors
            .read()
            .unwrap()
            .values()
            .filter(|d| d.last_activity.elapsed() > timeout)
            .map(|d| d.id)
            .collect()
    }

    // ---------- program capture ----------

    /// Arm capture mode for every descriptor of `player`, atomically.
    pub fn set_capture(&self, player: Dbref, capture: ProgramCapture) {
        self.captures.write().unwrap().insert(player, capture);
    }

    /// Disarm capture mode on all of the player's descriptors. Returns the
    /// capture that was armed, if any.
    pub fn clear_capture(&self, player: Dbref) -> Option<ProgramCapture> {
        self.captures.write().unwrap().remove(&player)
    }

    #[must_use]
    pub fn capture_of(&self, player: Dbref) -> Option<ProgramCapture> {
        self.captures.read().unwrap().get(&player).cloned()
    }
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}

fn info_of(d: &Descriptor) -> DescriptorInfo {
    DescriptorInfo {
        id: d.id,
        player: d.player,
        state: d.state,
        transport: d.transport,
        peer_addr: d.peer_addr.clone(),
        connected_at: d.connected_at,
        last_activity: d.last_activity,
    }
}

/// A session double that collects everything sent to it. Tests assert on
/// the collected lines.
pub struct MockSession {
    lines: Mutex<Vec<String>>,
    events: Mutex<Vec<WorldEvent>>,
    disconnected: Mutex<bool>,
}

impl MockSession {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(vec![]),
            events: Mutex::new(vec![]),
            disconnected: Mutex::new(false),
        })
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<WorldEvent> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn was_disconnected(&self) -> bool {
        *self.disconnected.lock().unwrap()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
        self.events.lock().unwrap().clear();
    }
}

impl Session for MockSession {
    fn send_event(&self, ev: &WorldEvent) -> Result<(), SessionError> {
        self.lines.lock().unwrap().push(ev.text.clone());
        self.events.lock().unwrap().push(ev.clone());
        Ok(())
    }

    fn send_line(&self, line: &str) -> Result<(), SessionError> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn disconnect(&self) -> Result<(), SessionError> {
        *self.disconnected.lock().unwrap() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::attr::A_DESC;

    #[test]
    fn test_descriptor_lifecycle() {
        let conns = Connections::new();
        let s = MockSession::new();
        let id = conns.new_connection(TransportKind::StreamLine, "10.0.0.1:5", s);
        assert!(conns.player_of(id).is_none());

        let p = Dbref::mk_id(5);
        conns.login_complete(id, p, false);
        assert_eq!(conns.player_of(id), Some(p));
        assert_eq!(conns.descriptors_for(p), vec![id]);
        assert!(conns.is_connected(p));

        conns.remove(id);
        assert!(!conns.is_connected(p));
    }

    #[test]
    fn test_idle_and_conn_time_across_descriptors() {
        let conns = Connections::new();
        let p = Dbref::mk_id(5);
        let a = conns.new_connection(TransportKind::StreamLine, "a", MockSession::new());
        let b = conns.new_connection(TransportKind::StreamLine, "b", MockSession::new());
        conns.login_complete(a, p, false);
        conns.login_complete(b, p, false);
        std::thread::sleep(Duration::from_millis(5));
        conns.touch(b);
        // Least idle wins for idle time.
        assert!(conns.idle_time(p).unwrap() < Duration::from_millis(5));
        // Longest connection wins for conn time.
        assert!(conns.conn_time(p).unwrap() >= Duration::from_millis(5));
    }

    #[test]
    fn test_capture_is_per_player() {
        let conns = Connections::new();
        let p = Dbref::mk_id(5);
        assert!(conns.capture_of(p).is_none());
        conns.set_capture(p, ProgramCapture {
            obj: Dbref::mk_id(9),
            attr: A_DESC,
            registers: vec![],
        });
        assert!(conns.capture_of(p).is_some());
        let cleared = conns.clear_capture(p).unwrap();
        assert_eq!(cleared.obj, Dbref::mk_id(9));
        assert!(conns.capture_of(p).is_none());
    }
}
