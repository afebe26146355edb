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

//! Input → command resolution. In order: single-character prefixes, the
//! command table (exact, then unique `@`-prefix abbreviation), the generic
//! `@attr obj=value` set, channel aliases, exits (current room, then the
//! master room), enter/leave aliases, `$`-command scans, and finally "Huh?".

mod building;
mod commands;
mod queueing;

use crate::eval::Frame;
use crate::matching;
use crate::movement;
use crate::tasks::{Ctx, QueueEntry};
use lazy_static::lazy_static;
use marsh_common::attr::{A_EALIAS, A_LALIAS, AttrFlag};
use marsh_common::events::{EventKind, WorldEvent};
use marsh_common::util::{split_top_level, strip_braces, wild_match_captures};
use marsh_common::{Dbref, NOTHING, ObjFlag};
use std::collections::HashMap;
use tracing::debug;

const HUH: &str = r#"Huh?  (Type "help" for help.)"#;

/// Per-command identity and parsed input, handed to handlers.
pub struct CmdEnv {
    pub executor: Dbref,
    pub enactor: Dbref,
    pub caller: Dbref,
    pub registers: Vec<String>,
    pub switches: Vec<String>,
    /// Raw argument text after the command word.
    pub arg: String,
    /// `arg` up to the first `=`.
    pub lhs: String,
    /// `arg` after the first `=`, when one is present.
    pub rhs: Option<String>,
}

impl CmdEnv {
    fn new(executor: Dbref, enactor: Dbref, registers: &[String]) -> Self {
        Self {
            executor,
            enactor,
            caller: enactor,
            registers: registers.to_vec(),
            switches: vec![],
            arg: String::new(),
            lhs: String::new(),
            rhs: None,
        }
    }

    fn with_arg(mut self, arg: &str) -> Self {
        self.arg = arg.trim().to_string();
        match self.arg.split_once('=') {
            Some((l, r)) => {
                self.lhs = l.trim().to_string();
                self.rhs = Some(r.trim().to_string());
            }
            None => {
                self.lhs = self.arg.clone();
                self.rhs = None;
            }
        }
        self
    }

    /// One switch was given (case-insensitive)?
    #[must_use]
    pub fn has_switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

type Handler = fn(&mut Ctx<'_>, &CmdEnv);

pub struct CommandDef {
    pub name: &'static str,
    pub no_guest: bool,
    pub handler: Handler,
}

lazy_static! {
    static ref COMMANDS: HashMap<&'static str, CommandDef> = {
        let mut table = HashMap::new();
        commands::register(&mut table);
        building::register(&mut table);
        queueing::register(&mut table);
        table
    };
}

/// Run one queue entry. Attribute-sourced entries are split on top-level
/// semicolons and `%`-substituted; direct input runs as one literal line.
pub fn execute_entry(ctx: &mut Ctx<'_>, entry: &QueueEntry) {
    if !ctx.world.graph.contains(entry.executor) {
        return;
    }
    if entry.subst {
        if ctx
            .world
            .graph
            .get(entry.executor)
            .is_some_and(|o| o.flags.contains(ObjFlag::Halted))
        {
            return;
        }
        for piece in split_top_level(&entry.command, ';') {
            let piece = strip_braces(&piece);
            if piece.is_empty() {
                continue;
            }
            let frame = Frame {
                executor: entry.executor,
                enactor: entry.cause,
                caller: entry.caller,
                depth: 0,
                registers: entry.registers.clone(),
            };
            let line = ctx.evaluator.exec(ctx.world, &frame, piece, &entry.args);
            process_command(ctx, entry.executor, entry.cause, &entry.registers, &line);
        }
    } else {
        process_command(
            ctx,
            entry.executor,
            entry.cause,
            &entry.registers,
            &entry.command,
        );
    }
}

/// The five-stage resolution described at the top of this module.
pub fn process_command(
    ctx: &mut Ctx<'_>,
    executor: Dbref,
    enactor: Dbref,
    registers: &[String],
    line: &str,
) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    // Stage 1: single-character prefixes.
    if let Some(rest) = line.strip_prefix('"') {
        let env = CmdEnv::new(executor, enactor, registers).with_arg(rest);
        commands::do_say(ctx, &env);
        return;
    }
    if let Some(rest) = line.strip_prefix(':') {
        let env = CmdEnv::new(executor, enactor, registers).with_arg(rest);
        commands::do_pose(ctx, &env);
        return;
    }
    if let Some(rest) = line.strip_prefix(';') {
        let env = CmdEnv::new(executor, enactor, registers).with_arg(rest);
        commands::do_pose_nospace(ctx, &env);
        return;
    }
    if let Some(rest) = line.strip_prefix('&') {
        let env = CmdEnv::new(executor, enactor, registers).with_arg(rest);
        building::do_vattr_set(ctx, &env);
        return;
    }

    // Stage 2: split name from args, then name from switches.
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a),
        None => (line, ""),
    };
    let mut parts = word.split('/');
    let name = parts.next().unwrap_or(word).to_lowercase();
    let switches: Vec<String> = parts.map(|s| s.to_string()).collect();

    // Stage 3: table lookup, exact first, then unique @-abbreviation.
    let mut hit = COMMANDS.get(name.as_str());
    if hit.is_none() && name.starts_with('@') {
        let mut matches = COMMANDS
            .values()
            .filter(|c| c.name.starts_with(&name))
            .collect::<Vec<_>>();
        if matches.len() == 1 {
            hit = Some(matches.remove(0));
        }
    }

    if let Some(cmd) = hit {
        let is_guest = ctx
            .world
            .graph
            .get(executor)
            .is_some_and(|o| o.is_guest());
        if cmd.no_guest && is_guest {
            ctx.world.notify(executor, "Guests may not do that.");
            return;
        }
        let mut env = CmdEnv::new(executor, enactor, registers).with_arg(arg);
        env.switches = switches;
        (cmd.handler)(ctx, &env);
        return;
    }

    // Stage 3b: `@<attr> obj=value` with no command hit falls through to a
    // generic attribute set.
    if let Some(attr_name) = name.strip_prefix('@')
        && arg.contains('=')
    {
        let known = ctx.world.registry.resolve(attr_name).is_some();
        if known {
            let mut env = CmdEnv::new(executor, enactor, registers)
                .with_arg(&format!("{attr_name} {arg}"));
            env.switches = switches;
            building::do_vattr_set(ctx, &env);
            return;
        }
    }

    // Stage 4: channel alias.
    if let Some(channel) = ctx.world.channel_for(executor, &name) {
        let channel = channel.to_string();
        let speaker = ctx.world.name_of(executor);
        let ev = WorldEvent::new(
            EventKind::Channel,
            executor,
            format!("[{channel}] {speaker}: {arg}"),
        )
        .on_channel(channel)
        .to_player(executor);
        ctx.world.bus.emit(&ev);
        return;
    }

    // Stage 4b: exits, here then the master room.
    let location = ctx
        .world
        .graph
        .get(executor)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    for room in [location, ctx.world.master_room()] {
        if !room.is_valid() {
            continue;
        }
        if let Some(exit) = match_exit(ctx, room, line) {
            movement::traverse_exit(ctx, executor, exit);
            return;
        }
    }

    // Stage 4c: enter/leave aliases.
    if location.is_valid() {
        for item in ctx.world.graph.contents_of(location) {
            if alias_matches(ctx, item, A_EALIAS, line) {
                movement::enter_thing(ctx, executor, item);
                return;
            }
        }
        if alias_matches(ctx, location, A_LALIAS, line) {
            movement::leave_thing(ctx, executor);
            return;
        }
    }

    // Stage 4d: $-commands.
    if scan_dollar_commands(ctx, executor, enactor, registers, line) {
        return;
    }

    // Stage 5: give up.
    debug!(?executor, input = line, "unmatched command");
    ctx.world.notify(executor, HUH);
}

fn match_exit(ctx: &Ctx<'_>, room: Dbref, input: &str) -> Option<Dbref> {
    ctx.world
        .graph
        .exits_of(room)
        .into_iter()
        .find(|e| {
            ctx.world
                .graph
                .get(*e)
                .is_some_and(|o| !o.is_going() && o.name_matches(input, true))
        })
}

fn alias_matches(ctx: &Ctx<'_>, obj: Dbref, attr: u16, input: &str) -> bool {
    let Some(text) = ctx.world.graph.attr_text(&ctx.world.registry, obj, attr) else {
        return false;
    };
    text.split(';')
        .any(|alias| !alias.trim().is_empty() && alias.trim().eq_ignore_ascii_case(input))
}

/// Scan `$pattern:command` attributes on everything in reach: the room's
/// contents, the executor's inventory, the room itself, and the master
/// room's contents. Every match queues; captures ride along as `%0`-`%9`.
fn scan_dollar_commands(
    ctx: &mut Ctx<'_>,
    executor: Dbref,
    _enactor: Dbref,
    registers: &[String],
    line: &str,
) -> bool {
    let location = ctx
        .world
        .graph
        .get(executor)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    let master = ctx.world.master_room();

    let mut candidates: Vec<Dbref> = Vec::new();
    if location.is_valid() {
        candidates.extend(ctx.world.graph.contents_of(location));
        candidates.push(location);
    }
    candidates.extend(ctx.world.graph.contents_of(executor));
    if master.is_valid() && master != location {
        candidates.extend(ctx.world.graph.contents_of(master));
    }
    candidates.retain(|d| *d != executor);
    candidates.dedup();

    let mut matched = false;
    for obj in candidates {
        let Some(o) = ctx.world.graph.get(obj) else {
            continue;
        };
        if o.flags.contains(ObjFlag::Halted) {
            continue;
        }
        let attrs: Vec<(u16, String)> = o
            .attrs
            .iter()
            .filter(|(_, v)| v.text.starts_with('$'))
            .filter(|(num, v)| {
                let def_flags = ctx
                    .world
                    .registry
                    .get(**num)
                    .map(|d| d.flags)
                    .unwrap_or_default();
                !(def_flags | v.flags).contains(AttrFlag::NoCommand)
            })
            .map(|(num, v)| (*num, v.text.clone()))
            .collect();
        for (_num, text) in attrs {
            let Some((pattern, command)) = text[1..].split_once(':') else {
                continue;
            };
            let Some(mut captures) = wild_match_captures(pattern, line) else {
                continue;
            };
            captures.truncate(10);
            matched = true;
            let entry = ctx.queues.make_entry(
                obj,
                executor,
                obj,
                command.to_string(),
                captures,
                registers.to_vec(),
                true,
            );
            ctx.queues.enqueue(entry);
        }
    }
    matched
}

/// Shared by handlers: match or complain inline.
pub(crate) fn match_or_complain(ctx: &mut Ctx<'_>, looker: Dbref, name: &str) -> Option<Dbref> {
    let result = matching::match_object(ctx.world, looker, name);
    if let Some(complaint) = matching::match_complaint(result) {
        ctx.world.notify(looker, complaint);
        return None;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use crate::sessions::{MockSession, TransportKind};
    use crate::tasks::Queues;
    use crate::world::World;
    use marsh_common::ObjectKind;
    use marsh_common::util::BitEnum;
    use std::sync::Arc;

    pub(crate) struct Game {
        pub world: World,
        pub queues: Queues,
    }

    impl Game {
        pub fn new() -> Self {
            Self {
                world: World::scratch(),
                queues: Queues::new(1000),
            }
        }

        pub fn connect_player(&mut self, name: &str, room: Dbref) -> (Dbref, Arc<MockSession>) {
            let p = self
                .world
                .graph
                .create_object(ObjectKind::Player, name, NOTHING);
            self.world.graph.get_mut(p).unwrap().owner = p;
            self.world.graph.add_to_contents(p, room).unwrap();
            let session = MockSession::new();
            let conns = self.world.conns.clone();
            let id = conns.new_connection(TransportKind::StreamLine, "test", session.clone());
            conns.login_complete(id, p, false);
            self.world.bus.attach(id, session.clone());
            self.world.bus.bind_player(id, p);
            (p, session)
        }

        pub fn run(&mut self, player: Dbref, line: &str) {
            let mut ctx = Ctx {
                world: &mut self.world,
                queues: &mut self.queues,
                evaluator: &SubstEvaluator,
            };
            process_command(&mut ctx, player, player, &[], line);
        }

        /// Drain the immediate queue to quiescence, like scheduler ticks
        /// with no deferred work.
        pub fn drain(&mut self) {
            while let Some(entry) = self.queues.pop_immediate() {
                let mut ctx = Ctx {
                    world: &mut self.world,
                    queues: &mut self.queues,
                    evaluator: &SubstEvaluator,
                };
                execute_entry(&mut ctx, &entry);
            }
        }
    }

    #[test]
    fn test_huh_fallback() {
        let mut g = Game::new();
        let limbo = Dbref::mk_id(0);
        let (p, session) = g.connect_player("Otter", limbo);
        g.run(p, "frobnicate wildly");
        assert_eq!(session.lines(), vec![HUH]);
    }

    #[test]
    fn test_say_prefix_and_word() {
        let mut g = Game::new();
        let limbo = Dbref::mk_id(0);
        let (p, session) = g.connect_player("Otter", limbo);
        let (_w, witness) = g.connect_player("Witness", limbo);
        g.run(p, "\"hello");
        assert_eq!(session.lines(), vec![r#"You say "hello""#]);
        assert_eq!(witness.lines(), vec![r#"Otter says "hello""#]);
        session.clear();
        witness.clear();
        g.run(p, "say hello");
        assert_eq!(session.lines(), vec![r#"You say "hello""#]);
        assert_eq!(witness.lines(), vec![r#"Otter says "hello""#]);
    }

    #[test]
    fn test_at_prefix_abbreviation() {
        let mut g = Game::new();
        let limbo = Dbref::mk_id(0);
        let (p, session) = g.connect_player("Otter", limbo);
        // "@pem" unambiguously abbreviates @pemit.
        g.run(p, "@pem me=test line");
        assert_eq!(session.lines(), vec!["test line"]);
    }

    #[test]
    fn test_exit_fallback_moves() {
        let mut g = Game::new();
        let limbo = Dbref::mk_id(0);
        let god = marsh_common::GOD;
        let annex = g.world.graph.create_object(ObjectKind::Room, "Annex", god);
        let exit = g
            .world
            .graph
            .create_object(ObjectKind::Exit, "North;n", god);
        g.world.graph.get_mut(exit).unwrap().location = annex;
        g.world.graph.add_exit(exit, limbo).unwrap();
        let (p, _session) = g.connect_player("Otter", limbo);
        g.run(p, "north");
        assert_eq!(g.world.graph.get(p).unwrap().location, annex);
    }

    #[test]
    fn test_dollar_command_scan() {
        let mut g = Game::new();
        let limbo = Dbref::mk_id(0);
        let god = marsh_common::GOD;
        let gadget = g
            .world
            .graph
            .create_object(ObjectKind::Thing, "gadget", god);
        g.world.graph.add_to_contents(gadget, limbo).unwrap();
        let reg_num = g.world.registry.resolve_or_define("DO_WAVE");
        g.world
            .graph
            .set_attr_raw(
                gadget,
                reg_num,
                "$wave *:@pemit %#=The gadget waves back at %0.",
                NOTHING,
                BitEnum::new(),
            )
            .unwrap();
        let (p, session) = g.connect_player("Otter", limbo);
        g.run(p, "wave everyone");
        g.drain();
        assert_eq!(
            session.lines(),
            vec!["The gadget waves back at everyone."]
        );
    }

    #[test]
    fn test_guest_gating() {
        let mut g = Game::new();
        let limbo = Dbref::mk_id(0);
        let (p, session) = g.connect_player("Guesty", limbo);
        g.world.graph.get_mut(p).unwrap().flags.set(ObjFlag::Guest);
        g.run(p, "@create widget");
        assert_eq!(session.lines(), vec!["Guests may not do that."]);
    }
}
