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

//! Speech, perception, and movement commands.

use super::{CmdEnv, CommandDef, match_or_complain};
use crate::locks::{self, handle_lock_failure};
use crate::login;
use crate::look;
use crate::matching;
use crate::movement;
use crate::perms;
use crate::tasks::Ctx;
use crate::triggers::{self, did_it};
use marsh_common::attr::{A_ADROP, A_ASUCC, A_DROP, A_ODROP, A_OSUCC, A_SUCC, LockKind};
use marsh_common::events::{EventKind, WorldEvent};
use marsh_common::{
    Dbref, FlagGlyphs, NOTHING, ObjFlag, ObjectKind, obj_flag_letters, power_letters,
};
use std::collections::HashMap;

pub(super) fn register(table: &mut HashMap<&'static str, CommandDef>) {
    let defs = [
        CommandDef {
            name: "say",
            no_guest: false,
            handler: do_say,
        },
        CommandDef {
            name: "pose",
            no_guest: false,
            handler: do_pose,
        },
        CommandDef {
            name: "think",
            no_guest: false,
            handler: do_think,
        },
        CommandDef {
            name: "look",
            no_guest: false,
            handler: do_look,
        },
        CommandDef {
            name: "examine",
            no_guest: false,
            handler: do_examine,
        },
        CommandDef {
            name: "inventory",
            no_guest: false,
            handler: do_inventory,
        },
        CommandDef {
            name: "who",
            no_guest: false,
            handler: do_who,
        },
        CommandDef {
            name: "page",
            no_guest: false,
            handler: do_page,
        },
        CommandDef {
            name: "get",
            no_guest: false,
            handler: do_get,
        },
        CommandDef {
            name: "take",
            no_guest: false,
            handler: do_get,
        },
        CommandDef {
            name: "drop",
            no_guest: false,
            handler: do_drop,
        },
        CommandDef {
            name: "home",
            no_guest: false,
            handler: do_home,
        },
        CommandDef {
            name: "goto",
            no_guest: false,
            handler: do_goto,
        },
        CommandDef {
            name: "go",
            no_guest: false,
            handler: do_goto,
        },
        CommandDef {
            name: "enter",
            no_guest: false,
            handler: do_enter,
        },
        CommandDef {
            name: "leave",
            no_guest: false,
            handler: do_leave,
        },
        CommandDef {
            name: "@emit",
            no_guest: false,
            handler: do_emit,
        },
        CommandDef {
            name: "@pemit",
            no_guest: false,
            handler: do_pemit,
        },
    ];
    for def in defs {
        table.insert(def.name, def);
    }
}

fn location_of(ctx: &Ctx<'_>, obj: Dbref) -> Dbref {
    ctx.world.graph.get(obj).map(|o| o.location).unwrap_or(NOTHING)
}

pub(super) fn do_say(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let msg = &env.arg;
    ctx.world
        .notify(env.executor, format!(r#"You say "{msg}""#));
    let room = location_of(ctx, env.executor);
    if room.is_valid() {
        let name = ctx.world.name_of(env.executor);
        let line = format!(r#"{name} says "{msg}""#);
        let ev = WorldEvent::new(EventKind::Say, env.executor, line).in_room(room);
        ctx.world.emit_to_room_except(room, &[env.executor], &ev);
        triggers::listen_scan(ctx, room, env.executor, &format!("{name} says {msg}"));
    }
}

pub(super) fn do_pose(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    pose(ctx, env, " ");
}

pub(super) fn do_pose_nospace(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    pose(ctx, env, "");
}

fn pose(ctx: &mut Ctx<'_>, env: &CmdEnv, sep: &str) {
    let room = location_of(ctx, env.executor);
    let name = ctx.world.name_of(env.executor);
    let line = format!("{name}{sep}{}", env.arg);
    if room.is_valid() {
        let ev = WorldEvent::new(EventKind::Pose, env.executor, line.clone()).in_room(room);
        ctx.world.emit_to_room(room, &ev);
        triggers::listen_scan(ctx, room, env.executor, &line);
    } else {
        ctx.world.notify(env.executor, line);
    }
}

fn do_think(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    ctx.world.notify(env.executor, env.arg.clone());
}

fn do_look(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    if env.arg.is_empty() {
        let room = location_of(ctx, env.executor);
        look::show_room(ctx, env.executor, room);
        return;
    }
    let Some(target) = match_or_complain(ctx, env.executor, &env.arg) else {
        return;
    };
    match ctx.world.graph.get(target).map(|o| o.kind) {
        Some(ObjectKind::Room) => look::show_room(ctx, env.executor, target),
        _ => look::show_thing(ctx, env.executor, target),
    }
}

fn do_examine(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let target = if env.arg.is_empty() {
        location_of(ctx, env.executor)
    } else {
        match match_or_complain(ctx, env.executor, &env.arg) {
            Some(t) => t,
            None => return,
        }
    };
    let Some(obj) = ctx.world.graph.get(target) else {
        ctx.world.notify(env.executor, "I don't see that here.");
        return;
    };

    let owner_name = ctx.world.name_of(obj.owner);
    if !perms::controls(ctx.world, ctx.evaluator, env.executor, target)
        && !obj.flags.contains(ObjFlag::Visual)
    {
        let line = format!("{} is owned by {owner_name}.", obj.display_name());
        ctx.world.notify(env.executor, line);
        return;
    }

    let header = format!(
        "{}(#{}{})",
        obj.display_name(),
        target.id(),
        FlagGlyphs {
            kind: obj.kind,
            flags: obj.flags
        }
    );
    let mut lines = vec![
        header,
        format!("Type: {}  Flags: {}", obj.kind, obj_flag_letters(obj.flags)),
        format!("Owner: {owner_name}  Zone: {}", ctx.world.name_of(obj.zone)),
        format!(
            "Parent: {}  Location: {}",
            ctx.world.name_of(obj.parent),
            ctx.world.name_of(obj.location)
        ),
        format!(
            "Home: {}  Pennies: {}",
            ctx.world.name_of(obj.link),
            obj.pennies
        ),
    ];
    let powers = power_letters(obj.powers);
    if !powers.is_empty() {
        lines.push(format!("Powers: {powers}"));
    }

    let attrs: Vec<(u16, marsh_common::attr::AttrValue)> = obj
        .attrs
        .iter()
        .map(|(n, v)| (*n, v.clone()))
        .collect();
    for (num, value) in attrs {
        if !perms::can_read_attr(ctx.world, ctx.evaluator, env.executor, target, num, &value) {
            continue;
        }
        let def = ctx.world.registry.get(num);
        if def.is_some_and(|d| d.flags.contains(marsh_common::attr::AttrFlag::NoName)) {
            continue;
        }
        let name = def
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("#{num}"));
        let annotation =
            perms::attr_annotation(ctx.world, ctx.evaluator, env.executor, target, num, &value)
                .map(|a| format!(" {a}"))
                .unwrap_or_default();
        lines.push(format!("{name}{annotation}: {}", value.text));
    }

    let contents = ctx.world.graph.contents_of(target);
    if !contents.is_empty() {
        lines.push("Contents:".to_string());
        for d in contents {
            lines.push(ctx.world.name_of(d));
        }
    }
    let exits = ctx.world.graph.exits_of(target);
    if !exits.is_empty() {
        lines.push("Exits:".to_string());
        for d in exits {
            lines.push(ctx.world.name_of(d));
        }
    }
    for line in lines {
        ctx.world.notify(env.executor, line);
    }
}

fn do_inventory(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let carried = ctx.world.graph.contents_of(env.executor);
    if carried.is_empty() {
        ctx.world.notify(env.executor, "You aren't carrying anything.");
        return;
    }
    ctx.world.notify(env.executor, "You are carrying:");
    for d in carried {
        let line = ctx.world.name_of(d);
        ctx.world.notify(env.executor, line);
    }
}

fn do_who(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    for row in login::who_report(ctx) {
        ctx.world.notify(env.executor, row);
    }
}

fn do_page(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(msg) = env.rhs.as_ref() else {
        ctx.world.notify(env.executor, "Page whom with what?");
        return;
    };
    let Some(target) = ctx.world.graph.lookup_player(&env.lhs) else {
        ctx.world.notify(env.executor, "I don't recognize that name.");
        return;
    };
    let haven = ctx
        .world
        .graph
        .get(target)
        .is_some_and(|o| o.flags.contains(ObjFlag::Haven));
    if haven || !ctx.world.conns.is_connected(target) {
        let name = ctx.world.name_of(target);
        ctx.world
            .notify(env.executor, format!("{name} is not accepting pages."));
        return;
    }
    let from = ctx.world.name_of(env.executor);
    let ev = WorldEvent::new(EventKind::Page, env.executor, format!("{from} pages: {msg}"))
        .to_player(target);
    ctx.world.bus.emit(&ev);
    let to = ctx.world.name_of(target);
    ctx.world
        .notify(env.executor, format!(r#"You paged {to} with "{msg}"."#));
}

fn do_get(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let thing = matching::match_in_room(ctx.world, env.executor, &env.arg);
    if let Some(complaint) = matching::match_complaint(thing) {
        ctx.world.notify(env.executor, complaint);
        return;
    }
    let kind = ctx.world.graph.get(thing).map(|o| o.kind);
    if !matches!(kind, Some(ObjectKind::Thing)) {
        ctx.world.notify(env.executor, "You can't pick that up.");
        return;
    }
    if !locks::could_do_it(ctx.world, ctx.evaluator, env.executor, thing, LockKind::Default) {
        handle_lock_failure(
            ctx,
            env.executor,
            thing,
            LockKind::Default,
            "You can't pick that up.",
        );
        return;
    }
    let source = location_of(ctx, thing);
    if ctx.world.graph.remove_from_contents(thing).is_err()
        || ctx.world.graph.add_to_contents(thing, env.executor).is_err()
    {
        ctx.world.notify(env.executor, "You can't pick that up.");
        return;
    }
    ctx.world.persist_objs(&[source, thing, env.executor]);
    did_it(
        ctx,
        env.executor,
        thing,
        A_SUCC,
        Some("Taken."),
        A_OSUCC,
        None,
        A_ASUCC,
    );
}

fn do_drop(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let thing = matching::match_carried(ctx.world, env.executor, &env.arg);
    if let Some(complaint) = matching::match_complaint(thing) {
        ctx.world.notify(env.executor, complaint);
        return;
    }
    let room = location_of(ctx, env.executor);
    if !room.is_valid() {
        ctx.world.notify(env.executor, "You can't drop that here.");
        return;
    }
    if ctx.world.graph.remove_from_contents(thing).is_err()
        || ctx.world.graph.add_to_contents(thing, room).is_err()
    {
        ctx.world.notify(env.executor, "You can't drop that here.");
        return;
    }
    ctx.world.persist_objs(&[env.executor, thing, room]);
    did_it(
        ctx,
        env.executor,
        thing,
        A_DROP,
        Some("Dropped."),
        A_ODROP,
        None,
        A_ADROP,
    );
}

fn do_home(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    movement::send_home(ctx, env.executor);
}

fn do_goto(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    if env.arg.eq_ignore_ascii_case("home") {
        movement::send_home(ctx, env.executor);
        return;
    }
    let room = location_of(ctx, env.executor);
    let exit = ctx
        .world
        .graph
        .exits_of(room)
        .into_iter()
        .find(|e| {
            ctx.world
                .graph
                .get(*e)
                .is_some_and(|o| o.name_matches(&env.arg, true))
        });
    match exit {
        Some(exit) => movement::traverse_exit(ctx, env.executor, exit),
        None => ctx.world.notify(env.executor, "You can't go that way."),
    }
}

fn do_enter(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let thing = matching::match_in_room(ctx.world, env.executor, &env.arg);
    if let Some(complaint) = matching::match_complaint(thing) {
        ctx.world.notify(env.executor, complaint);
        return;
    }
    movement::enter_thing(ctx, env.executor, thing);
}

fn do_leave(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    movement::leave_thing(ctx, env.executor);
}

fn do_emit(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let room = location_of(ctx, env.executor);
    if !room.is_valid() {
        ctx.world.notify(env.executor, env.arg.clone());
        return;
    }
    let ev = WorldEvent::new(EventKind::Emit, env.executor, env.arg.clone()).in_room(room);
    ctx.world.emit_to_room(room, &ev);
}

pub(super) fn do_pemit(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(msg) = env.rhs.as_ref() else {
        ctx.world.notify(env.executor, "Emit what to whom?");
        return;
    };
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    let ev = WorldEvent::new(EventKind::Emit, env.executor, msg.clone()).to_player(target);
    ctx.world.bus.emit(&ev);
}
