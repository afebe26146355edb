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

//! The login-phase grammar and the connect/disconnect transitions. All of
//! this runs on the game loop: transports forward login lines through the
//! scheduler, so flag writes (dark connect included) stay single-writer.

use crate::look;
use crate::sessions::TransportKind;
use crate::tasks::Ctx;
use argon2::password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use marsh_common::attr::{A_ACONNECT, A_ADISCONNECT, A_LAST, A_PASS};
use marsh_common::events::{EventKind, WorldEvent};
use marsh_common::util::{BitEnum, parse_into_words};
use marsh_common::{Dbref, NOTHING, ObjFlag, ObjectKind};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use uuid::Uuid;

/// One-shot HTML activation sequence for pueblo-capable clients.
pub const PUEBLO_ACTIVATION: &str = "</xch_mudtext><img xch_mode=html>";

const LOGIN_HINT: &str =
    r#"Use "connect <name> <password>", "create <name> <password>", WHO, or QUIT."#;
const BAD_CREDENTIALS: &str = "Either that player does not exist, or has a different password.";
const MAX_LOGIN_FAILURES: u32 = 3;

/// What the transport should do after a login-phase line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Still at the login prompt.
    Pending,
    /// Authenticated; the descriptor is now Connected as this player.
    Connected(Dbref),
    /// Close the connection.
    Close,
}

pub fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .unwrap_or_default()
}

#[must_use]
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn send_line(ctx: &Ctx<'_>, descriptor: Uuid, line: &str) {
    if let Some(session) = ctx.world.conns.session_of(descriptor) {
        let _ = session.send_line(line);
    }
}

/// Process one line from a descriptor still in the Login state.
pub fn handle_login_line(ctx: &mut Ctx<'_>, descriptor: Uuid, line: &str) -> LoginOutcome {
    let words = parse_into_words(line);
    let Some(first) = words.first() else {
        return LoginOutcome::Pending;
    };
    let keyword = first.to_lowercase();

    if keyword == "who" {
        for row in who_report(ctx) {
            send_line(ctx, descriptor, &row);
        }
        return LoginOutcome::Pending;
    }
    if keyword == "quit" {
        send_line(ctx, descriptor, "Logged out.");
        return LoginOutcome::Close;
    }
    if keyword == "puebloclient" {
        ctx.world
            .conns
            .set_transport(descriptor, TransportKind::RichHtml);
        send_line(ctx, descriptor, PUEBLO_ACTIVATION);
        return LoginOutcome::Pending;
    }

    // Case-insensitive keyword prefixes: co / cd / cr.
    if keyword.starts_with("cd") {
        return connect_attempt(ctx, descriptor, &words, true);
    }
    if keyword.starts_with("cr") {
        return create_attempt(ctx, descriptor, &words);
    }
    if keyword.starts_with("co") {
        if words.get(1).is_some_and(|w| w.eq_ignore_ascii_case("guest")) {
            return guest_attempt(ctx, descriptor);
        }
        return connect_attempt(ctx, descriptor, &words, false);
    }

    send_line(ctx, descriptor, LOGIN_HINT);
    LoginOutcome::Pending
}

fn credential_failure(ctx: &mut Ctx<'_>, descriptor: Uuid) -> LoginOutcome {
    let failures = ctx.world.conns.login_failed(descriptor);
    if failures >= MAX_LOGIN_FAILURES {
        send_line(ctx, descriptor, "Too many failed attempts.");
        return LoginOutcome::Close;
    }
    send_line(ctx, descriptor, BAD_CREDENTIALS);
    LoginOutcome::Pending
}

fn connect_attempt(
    ctx: &mut Ctx<'_>,
    descriptor: Uuid,
    words: &[String],
    dark: bool,
) -> LoginOutcome {
    let (Some(name), Some(password)) = (words.get(1), words.get(2)) else {
        send_line(ctx, descriptor, LOGIN_HINT);
        return LoginOutcome::Pending;
    };
    let Some(player) = ctx.world.graph.lookup_player(name) else {
        return credential_failure(ctx, descriptor);
    };
    let Some(stored) = ctx.world.graph.attr_text_direct(player, A_PASS) else {
        return credential_failure(ctx, descriptor);
    };
    if !verify_password(&stored, password) {
        return credential_failure(ctx, descriptor);
    }
    let wizard = ctx
        .world
        .graph
        .get(player)
        .is_some_and(|o| o.is_wizard());
    if dark && !wizard {
        return credential_failure(ctx, descriptor);
    }
    complete_connection(ctx, descriptor, player, dark && wizard);
    LoginOutcome::Connected(player)
}

/// Names may not contain `"` or `;`, must be new, and must be sane.
fn valid_player_name(ctx: &Ctx<'_>, name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 24
        && !name.contains('"')
        && !name.contains(';')
        && !name.starts_with('#')
        && !name.starts_with('*')
        && ctx.world.graph.lookup_player(name).is_none()
}

fn create_attempt(ctx: &mut Ctx<'_>, descriptor: Uuid, words: &[String]) -> LoginOutcome {
    let (Some(name), Some(password)) = (words.get(1), words.get(2)) else {
        send_line(ctx, descriptor, LOGIN_HINT);
        return LoginOutcome::Pending;
    };
    if !valid_player_name(ctx, name) {
        send_line(ctx, descriptor, "You can't use that name.");
        return LoginOutcome::Pending;
    }
    let player = make_player(ctx, name, password, false);
    info!(?player, name, "player created");
    complete_connection(ctx, descriptor, player, false);
    LoginOutcome::Connected(player)
}

fn guest_attempt(ctx: &mut Ctx<'_>, descriptor: Uuid) -> LoginOutcome {
    if !ctx.world.config.guests_enabled {
        send_line(ctx, descriptor, "Guest connections are disabled.");
        return LoginOutcome::Pending;
    }
    // Reuse a parked guest, minting a fresh one when all are in use.
    let parked: Option<Dbref> = ctx
        .world
        .graph
        .iter()
        .filter(|o| o.kind == ObjectKind::Player && o.is_guest())
        .map(|o| o.dbref)
        .find(|d| !ctx.world.conns.is_connected(*d));
    let player = match parked {
        Some(p) => p,
        None => {
            let mut n = 1;
            let name = loop {
                let candidate = format!("Guest{n}");
                if ctx.world.graph.lookup_player(&candidate).is_none() {
                    break candidate;
                }
                n += 1;
            };
            let p = make_player(ctx, &name, &Uuid::new_v4().to_string(), true);
            info!(?p, "guest player created");
            p
        }
    };
    complete_connection(ctx, descriptor, player, false);
    LoginOutcome::Connected(player)
}

fn make_player(ctx: &mut Ctx<'_>, name: &str, password: &str, guest: bool) -> Dbref {
    let limbo = Dbref::mk_id(0);
    let player = ctx
        .world
        .graph
        .create_object(ObjectKind::Player, name, NOTHING);
    {
        let p = ctx.world.graph.get_mut(player).expect("just created");
        p.owner = player;
        p.link = limbo;
        p.pennies = 100;
        if guest {
            p.flags.set(ObjFlag::Guest);
        }
    }
    let _ = ctx
        .world
        .graph
        .set_attr_raw(player, A_PASS, hash_password(password), player, BitEnum::new());
    let _ = ctx.world.graph.add_to_contents(player, limbo);
    ctx.world.persist_objs(&[player, limbo]);
    ctx.world.persist_meta();
    if let Some(obj) = ctx.world.graph.get(player)
        && let Err(e) = ctx.world.persistence.update_player_index(obj, None)
    {
        debug!(?e, "player index write-through failed");
    }
    player
}

fn complete_connection(ctx: &mut Ctx<'_>, descriptor: Uuid, player: Dbref, dark: bool) {
    let reconnect = !ctx.world.conns.descriptors_for(player).is_empty();
    ctx.world.conns.login_complete(descriptor, player, dark);
    ctx.world.bus.bind_player(descriptor, player);

    {
        if let Some(p) = ctx.world.graph.get_mut(player) {
            p.flags.set(ObjFlag::Connected);
            if dark {
                p.flags.set(ObjFlag::Dark);
            }
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let _ = ctx
            .world
            .graph
            .set_attr_raw(player, A_LAST, now.to_string(), player, BitEnum::new());
    }
    ctx.world.persist_obj(player);

    let name = ctx.world.name_of(player);
    send_line(ctx, descriptor, &format!("Connected as {name}."));

    let location = ctx
        .world
        .graph
        .get(player)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    let is_dark = ctx.world.graph.get(player).is_some_and(|o| o.is_dark());
    if location.is_valid() && !is_dark {
        let text = if reconnect {
            format!("{name} has reconnected.")
        } else {
            format!("{name} has connected.")
        };
        let ev = WorldEvent::new(EventKind::Connect, player, text).in_room(location);
        ctx.world.emit_to_room_except(location, &[player], &ev);
    }

    fire_presence_triggers(ctx, player, A_ACONNECT);
    look::show_room(ctx, player, location);
}

/// AConnect/ADisconnect fire on the player, the master room, and the master
/// room's contents.
fn fire_presence_triggers(ctx: &mut Ctx<'_>, player: Dbref, attr: u16) {
    let master = ctx.world.master_room();
    let mut targets = vec![player, master];
    targets.extend(ctx.world.graph.contents_of(master));
    for obj in targets {
        let Some(text) = ctx.world.graph.attr_text(&ctx.world.registry, obj, attr) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let entry = ctx
            .queues
            .make_entry(obj, player, obj, text, vec![], vec![], true);
        ctx.queues.enqueue(entry);
    }
}

/// Transport-side close, `QUIT`, or `@boot`: tear the descriptor down and,
/// on the player's last descriptor, complete the disconnect.
pub fn handle_disconnect(ctx: &mut Ctx<'_>, descriptor: Uuid) {
    ctx.world.bus.detach(descriptor);
    let Some(info) = ctx.world.conns.remove(descriptor) else {
        return;
    };
    let player = info.player;
    if !player.is_valid() {
        return;
    }
    if !ctx.world.conns.descriptors_for(player).is_empty() {
        // Other descriptors remain; the player stays connected.
        return;
    }

    ctx.world.conns.clear_capture(player);
    if let Some(p) = ctx.world.graph.get_mut(player) {
        p.flags.clear(ObjFlag::Connected);
    }
    ctx.world.persist_obj(player);

    let name = ctx.world.name_of(player);
    let location = ctx
        .world
        .graph
        .get(player)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    let is_dark = ctx.world.graph.get(player).is_some_and(|o| o.is_dark());
    if location.is_valid() && !is_dark {
        let ev = WorldEvent::new(
            EventKind::Disconnect,
            player,
            format!("{name} has disconnected."),
        )
        .in_room(location);
        ctx.world.emit_to_room_except(location, &[player], &ev);
    }
    fire_presence_triggers(ctx, player, A_ADISCONNECT);
}

/// Forcibly close every descriptor a player has.
pub fn boot_player(ctx: &mut Ctx<'_>, player: Dbref, reason: &str) {
    for id in ctx.world.conns.descriptors_for(player) {
        if let Some(session) = ctx.world.conns.session_of(id) {
            let _ = session.send_line(reason);
            let _ = session.disconnect();
        }
    }
}

/// The WHO table, shared by the login prompt and the in-world command.
#[must_use]
pub fn who_report(ctx: &Ctx<'_>) -> Vec<String> {
    let mut rows = vec![format!("{:<18}{:>10}{:>6}", "Player Name", "On For", "Idle")];
    let players = ctx.world.conns.connected_players();
    for p in &players {
        let name = ctx.world.name_of(*p);
        let on_for = ctx.world.conns.conn_time(*p).unwrap_or_default();
        let idle = ctx.world.conns.idle_time(*p).unwrap_or_default();
        rows.push(format!(
            "{:<18}{:>10}{:>6}",
            name,
            fmt_on_for(on_for),
            fmt_idle(idle)
        ));
    }
    rows.push(format!("{} players are connected.", players.len()));
    rows
}

fn fmt_on_for(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let mins = (secs % 3600) / 60;
    if days > 0 {
        format!("{days}d {hours:02}:{mins:02}")
    } else {
        format!("{hours:02}:{mins:02}")
    }
}

fn fmt_idle(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use crate::sessions::MockSession;
    use crate::tasks::Queues;
    use crate::world::World;
    use std::sync::Arc;

    struct Login {
        world: World,
        queues: Queues,
    }

    impl Login {
        fn new() -> Self {
            Self {
                world: World::scratch(),
                queues: Queues::new(100),
            }
        }

        fn open(&mut self) -> (Uuid, Arc<MockSession>) {
            let session = MockSession::new();
            let id = self.world.conns.new_connection(
                TransportKind::StreamLine,
                "test",
                session.clone(),
            );
            self.world.bus.attach(id, session.clone());
            (id, session)
        }

        fn line(&mut self, id: Uuid, line: &str) -> LoginOutcome {
            let mut ctx = Ctx {
                world: &mut self.world,
                queues: &mut self.queues,
                evaluator: &SubstEvaluator,
            };
            handle_login_line(&mut ctx, id, line)
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("sekrit");
        assert!(verify_password(&hash, "sekrit"));
        assert!(!verify_password(&hash, "wrong"));
        assert!(!verify_password("not-a-hash", "sekrit"));
    }

    #[test]
    fn test_create_then_reconnect() {
        let mut l = Login::new();
        let (id, session) = l.open();
        let outcome = l.line(id, "create Otter sekrit");
        let LoginOutcome::Connected(player) = outcome else {
            panic!("expected connect, got {outcome:?}");
        };
        assert_eq!(l.world.graph.lookup_player("otter"), Some(player));
        assert!(session.lines().iter().any(|s| s.contains("Connected as Otter")));

        // A second descriptor can connect with the same credentials.
        let (id2, _s2) = l.open();
        let outcome = l.line(id2, "connect Otter sekrit");
        assert_eq!(outcome, LoginOutcome::Connected(player));
        assert_eq!(l.world.conns.descriptors_for(player).len(), 2);
    }

    #[test]
    fn test_connect_prefix_forms() {
        let mut l = Login::new();
        let (id, _) = l.open();
        let LoginOutcome::Connected(p) = l.line(id, "create Otter sekrit") else {
            panic!()
        };
        let (id2, _) = l.open();
        assert_eq!(l.line(id2, "co Otter sekrit"), LoginOutcome::Connected(p));
    }

    #[test]
    fn test_three_strikes_closes() {
        let mut l = Login::new();
        let (id, session) = l.open();
        assert_eq!(l.line(id, "connect nobody x"), LoginOutcome::Pending);
        assert_eq!(l.line(id, "connect nobody x"), LoginOutcome::Pending);
        assert_eq!(l.line(id, "connect nobody x"), LoginOutcome::Close);
        assert!(session.lines().iter().any(|s| s.contains("Too many")));
    }

    #[test]
    fn test_bad_names_rejected() {
        let mut l = Login::new();
        let (id, session) = l.open();
        assert_eq!(l.line(id, r#"create "quoted" pw"#), LoginOutcome::Pending);
        assert_eq!(l.line(id, "create God pw"), LoginOutcome::Pending);
        assert!(session.lines().iter().any(|s| s.contains("can't use that name")));
    }

    #[test]
    fn test_quit_and_who() {
        let mut l = Login::new();
        let (id, session) = l.open();
        assert_eq!(l.line(id, "WHO"), LoginOutcome::Pending);
        assert!(session.lines().iter().any(|s| s.contains("players are connected")));
        assert_eq!(l.line(id, "QUIT"), LoginOutcome::Close);
    }

    #[test]
    fn test_guest_connect() {
        let mut l = Login::new();
        let (id, _) = l.open();
        let LoginOutcome::Connected(g1) = l.line(id, "connect guest") else {
            panic!()
        };
        assert!(l.world.graph.get(g1).unwrap().is_guest());
        // A second guest gets a different player while the first is in use.
        let (id2, _) = l.open();
        let LoginOutcome::Connected(g2) = l.line(id2, "connect guest") else {
            panic!()
        };
        assert_ne!(g1, g2);
    }

    #[test]
    fn test_dark_connect_requires_wizard() {
        let mut l = Login::new();
        let (id, _) = l.open();
        let LoginOutcome::Connected(p) = l.line(id, "create Otter sekrit") else {
            panic!()
        };
        assert!(!l.world.graph.get(p).unwrap().is_dark());
        // Mortal cd is treated as a failed credential.
        let (id2, _) = l.open();
        assert_eq!(l.line(id2, "cd Otter sekrit"), LoginOutcome::Pending);

        l.world.graph.get_mut(p).unwrap().flags.set(ObjFlag::Wizard);
        let (id3, _) = l.open();
        assert_eq!(l.line(id3, "cd Otter sekrit"), LoginOutcome::Connected(p));
        assert!(l.world.graph.get(p).unwrap().is_dark());
    }

    #[test]
    fn test_disconnect_clears_connected_on_last_descriptor() {
        let mut l = Login::new();
        let (id, _) = l.open();
        let LoginOutcome::Connected(p) = l.line(id, "create Otter sekrit") else {
            panic!()
        };
        let (id2, _) = l.open();
        assert_eq!(l.line(id2, "connect Otter sekrit"), LoginOutcome::Connected(p));

        let mut ctx = Ctx {
            world: &mut l.world,
            queues: &mut l.queues,
            evaluator: &SubstEvaluator,
        };
        handle_disconnect(&mut ctx, id);
        assert!(l.world.graph.get(p).unwrap().flags.contains(ObjFlag::Connected));
        let mut ctx = Ctx {
            world: &mut l.world,
            queues: &mut l.queues,
            evaluator: &SubstEvaluator,
        };
        handle_disconnect(&mut ctx, id2);
        assert!(!l.world.graph.get(p).unwrap().flags.contains(ObjFlag::Connected));
    }
}
