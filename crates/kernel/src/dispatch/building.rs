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

//! Building and administration: object lifecycle, links, parents, flags,
//! attributes, locks, names.

use super::{CmdEnv, CommandDef, match_or_complain};
use crate::locks::parse_lock;
use crate::login;
use crate::matching;
use crate::perms;
use crate::tasks::Ctx;
use marsh_common::attr::{A_PASS, LockKind};
use marsh_common::util::BitEnum;
use marsh_common::{Dbref, GOD, NOTHING, ObjFlag, ObjectKind, parse_obj_flag};
use std::collections::HashMap;
use tracing::info;

pub(super) fn register(table: &mut HashMap<&'static str, CommandDef>) {
    let defs = [
        CommandDef {
            name: "@create",
            no_guest: true,
            handler: do_create,
        },
        CommandDef {
            name: "@dig",
            no_guest: true,
            handler: do_dig,
        },
        CommandDef {
            name: "@open",
            no_guest: true,
            handler: do_open,
        },
        CommandDef {
            name: "@destroy",
            no_guest: true,
            handler: do_destroy,
        },
        CommandDef {
            name: "@link",
            no_guest: true,
            handler: do_link,
        },
        CommandDef {
            name: "@unlink",
            no_guest: true,
            handler: do_unlink,
        },
        CommandDef {
            name: "@parent",
            no_guest: true,
            handler: do_parent,
        },
        CommandDef {
            name: "@chown",
            no_guest: true,
            handler: do_chown,
        },
        CommandDef {
            name: "@name",
            no_guest: true,
            handler: do_name,
        },
        CommandDef {
            name: "@set",
            no_guest: true,
            handler: do_set,
        },
        CommandDef {
            name: "@lock",
            no_guest: true,
            handler: do_lock,
        },
        CommandDef {
            name: "@unlock",
            no_guest: true,
            handler: do_unlock,
        },
        CommandDef {
            name: "@zone",
            no_guest: true,
            handler: do_zone,
        },
        CommandDef {
            name: "@teleport",
            no_guest: false,
            handler: do_teleport,
        },
        CommandDef {
            name: "@password",
            no_guest: true,
            handler: do_password,
        },
    ];
    for def in defs {
        table.insert(def.name, def);
    }
}

fn controls_or_complain(ctx: &mut Ctx<'_>, actor: Dbref, target: Dbref) -> bool {
    if perms::controls(ctx.world, ctx.evaluator, actor, target) {
        return true;
    }
    ctx.world.notify(actor, "Permission denied.");
    false
}

fn do_create(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let name = env.lhs.trim();
    if name.is_empty() {
        ctx.world.notify(env.executor, "Create what?");
        return;
    }
    let home = ctx
        .world
        .graph
        .get(env.executor)
        .map(|o| o.link)
        .unwrap_or(NOTHING);
    let thing = ctx
        .world
        .graph
        .create_object(ObjectKind::Thing, name, env.executor);
    if let Some(o) = ctx.world.graph.get_mut(thing) {
        o.link = home;
    }
    let _ = ctx.world.graph.add_to_contents(thing, env.executor);
    ctx.world.persist_objs(&[thing, env.executor]);
    ctx.world.persist_meta();
    info!(?thing, owner = ?env.executor, "object created");
    ctx.world
        .notify(env.executor, format!("Created: {name}({thing})."));
}

fn do_dig(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let name = env.lhs.trim();
    if name.is_empty() {
        ctx.world.notify(env.executor, "Dig what?");
        return;
    }
    let room = ctx
        .world
        .graph
        .create_object(ObjectKind::Room, name, env.executor);
    ctx.world.persist_obj(room);
    ctx.world.persist_meta();
    ctx.world
        .notify(env.executor, format!("{name} created as {room}."));

    // Optional "exit;aliases,back exit;aliases" pair.
    if let Some(rhs) = env.rhs.as_ref().filter(|r| !r.is_empty()) {
        let here = ctx
            .world
            .graph
            .get(env.executor)
            .map(|o| o.location)
            .unwrap_or(NOTHING);
        if !here.is_valid() {
            return;
        }
        let mut specs = rhs.splitn(2, ',');
        if let Some(out_name) = specs.next().map(str::trim).filter(|s| !s.is_empty()) {
            let exit = open_exit(ctx, env.executor, out_name, here, room);
            ctx.world
                .notify(env.executor, format!("Opened exit {exit}."));
        }
        if let Some(back_name) = specs.next().map(str::trim).filter(|s| !s.is_empty()) {
            let back = open_exit(ctx, env.executor, back_name, room, here);
            ctx.world
                .notify(env.executor, format!("Opened exit {back}."));
        }
    }
}

fn open_exit(ctx: &mut Ctx<'_>, owner: Dbref, name: &str, from: Dbref, to: Dbref) -> Dbref {
    let exit = ctx.world.graph.create_object(ObjectKind::Exit, name, owner);
    if let Some(e) = ctx.world.graph.get_mut(exit) {
        e.location = to;
    }
    let _ = ctx.world.graph.add_exit(exit, from);
    ctx.world.persist_objs(&[exit, from]);
    ctx.world.persist_meta();
    exit
}

fn do_open(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let name = env.lhs.trim();
    if name.is_empty() {
        ctx.world.notify(env.executor, "Open what?");
        return;
    }
    let here = ctx
        .world
        .graph
        .get(env.executor)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    if !here.is_valid() || !controls_or_complain(ctx, env.executor, here) {
        return;
    }
    let dest = match env.rhs.as_ref().filter(|r| !r.is_empty()) {
        Some(d) => matching::match_object(ctx.world, env.executor, d),
        None => NOTHING,
    };
    let exit = open_exit(ctx, env.executor, name, here, dest);
    ctx.world.notify(env.executor, format!("Opened {exit}."));
}

fn do_destroy(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    if target == GOD || target == Dbref::mk_id(0) {
        ctx.world.notify(env.executor, "You can't destroy that.");
        return;
    }
    let Some(obj) = ctx.world.graph.get(target) else {
        return;
    };
    if obj.kind == ObjectKind::Player {
        let wizard = ctx
            .world
            .graph
            .get(env.executor)
            .is_some_and(|o| o.is_wizard());
        if !wizard {
            ctx.world.notify(env.executor, "You can't destroy players.");
            return;
        }
    }
    if obj.flags.contains(ObjFlag::Safe) && !env.has_switch("override") {
        ctx.world.notify(
            env.executor,
            "That object is marked Safe. Use @destroy/override to destroy it.",
        );
        return;
    }
    let _ = ctx.world.graph.mark_going(target);
    ctx.world.persist_obj(target);
    info!(?target, by = ?env.executor, "object marked for destruction");
    ctx.world.notify(env.executor, "Destroyed.");
}

fn do_link(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    let Some(dest_name) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Link to where?");
        return;
    };
    let dest = matching::match_object(ctx.world, env.executor, dest_name);
    if let Some(complaint) = matching::match_complaint(dest) {
        ctx.world.notify(env.executor, complaint);
        return;
    }
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    let dest_ok = perms::controls(ctx.world, ctx.evaluator, env.executor, dest)
        || ctx
            .world
            .graph
            .get(dest)
            .is_some_and(|o| o.flags.contains(ObjFlag::LinkOk));
    if !dest_ok {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let kind = ctx.world.graph.get(target).map(|o| o.kind);
    match kind {
        // An exit's location is its destination.
        Some(ObjectKind::Exit) => {
            if let Some(e) = ctx.world.graph.get_mut(target) {
                e.location = dest;
            }
        }
        _ => {
            if let Some(o) = ctx.world.graph.get_mut(target) {
                o.link = dest;
            }
        }
    }
    ctx.world.persist_obj(target);
    ctx.world.notify(env.executor, "Linked.");
}

fn do_unlink(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    let kind = ctx.world.graph.get(target).map(|o| o.kind);
    if let Some(o) = ctx.world.graph.get_mut(target) {
        match kind {
            Some(ObjectKind::Exit) => o.location = NOTHING,
            _ => o.link = NOTHING,
        }
    }
    ctx.world.persist_obj(target);
    ctx.world.notify(env.executor, "Unlinked.");
}

fn do_parent(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    match env.rhs.as_ref().filter(|r| !r.is_empty()) {
        None => {
            if let Some(o) = ctx.world.graph.get_mut(target) {
                o.parent = NOTHING;
            }
            ctx.world.notify(env.executor, "Parent cleared.");
        }
        Some(parent_name) => {
            let parent = matching::match_object(ctx.world, env.executor, parent_name);
            if let Some(complaint) = matching::match_complaint(parent) {
                ctx.world.notify(env.executor, complaint);
                return;
            }
            if ctx.world.graph.parent_chain(parent).contains(&target) {
                ctx.world.notify(env.executor, "That would create a loop.");
                return;
            }
            if let Some(o) = ctx.world.graph.get_mut(target) {
                o.parent = parent;
            }
            ctx.world.notify(env.executor, "Parent set.");
        }
    }
    ctx.world.persist_obj(target);
}

fn do_chown(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    let Some(new_owner_name) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Give it to whom?");
        return;
    };
    let Some(new_owner) = ctx.world.graph.lookup_player(new_owner_name) else {
        ctx.world.notify(env.executor, "I don't recognize that name.");
        return;
    };
    let wizard = ctx
        .world
        .graph
        .get(env.executor)
        .is_some_and(|o| o.is_wizard());
    // Mortals can only give away what they already control.
    if !wizard && !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    if ctx.world.graph.get(target).map(|o| o.kind) == Some(ObjectKind::Player) {
        ctx.world.notify(env.executor, "Players own themselves.");
        return;
    }
    if let Some(o) = ctx.world.graph.get_mut(target) {
        o.owner = new_owner;
    }
    ctx.world.persist_obj(target);
    ctx.world.notify(env.executor, "Owner changed.");
}

fn do_name(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    let Some(new_name) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Name it what?");
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    let is_player = ctx.world.graph.get(target).map(|o| o.kind) == Some(ObjectKind::Player);
    let old_name = ctx
        .world
        .graph
        .get(target)
        .map(|o| o.name.clone())
        .unwrap_or_default();
    if is_player {
        let display = new_name.split(';').next().unwrap_or(new_name).trim();
        if display.is_empty()
            || new_name.contains('"')
            || (ctx.world.graph.lookup_player(display) != Some(target)
                && ctx.world.graph.lookup_player(display).is_some())
        {
            ctx.world.notify(env.executor, "You can't use that name.");
            return;
        }
    }
    if let Some(o) = ctx.world.graph.get_mut(target) {
        o.name = new_name.clone();
    }
    if is_player {
        ctx.world.graph.reindex_player(target, &old_name);
        if let Some(obj) = ctx.world.graph.get(target)
            && let Err(e) = ctx
                .world
                .persistence
                .update_player_index(obj, Some(&old_name))
        {
            tracing::warn!(?e, "player index write-through failed");
        }
    }
    ctx.world.persist_obj(target);
    ctx.world.notify(env.executor, "Name set.");
}

fn do_set(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    // Attribute form: @set obj/attr=value.
    if env.lhs.contains('/') {
        let (obj_name, attr_name) = env.lhs.split_once('/').expect("checked");
        let Some(target) = match_or_complain(ctx, env.executor, obj_name) else {
            return;
        };
        let value = env.rhs.clone().unwrap_or_default();
        let num = ctx.world.registry.resolve_or_define(attr_name);
        set_attr_or_complain(ctx, env.executor, target, num, &value);
        return;
    }

    let Some(flag_spec) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Set what?");
        return;
    };
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    let (clear, flag_name) = match flag_spec.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, flag_spec.as_str()),
    };
    let Some(flag) = parse_obj_flag(flag_name) else {
        ctx.world.notify(env.executor, "I don't understand that flag.");
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    // The privileged bits only move by God's hand.
    if matches!(flag, ObjFlag::Wizard | ObjFlag::Guest) && env.executor != GOD {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    if let Some(o) = ctx.world.graph.get_mut(target) {
        if clear {
            o.flags.clear(flag);
        } else {
            o.flags.set(flag);
        }
    }
    ctx.world.persist_obj(target);
    ctx.world.notify(
        env.executor,
        if clear { "Flag cleared." } else { "Flag set." },
    );
}

/// `&attr obj = value`, and the `@<attr> obj=value` fallthrough.
pub(super) fn do_vattr_set(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    // The first word is the attribute name; the rest is obj=value.
    let Some((attr_name, rest)) = env.arg.split_once(char::is_whitespace) else {
        ctx.world.notify(env.executor, "Set what on what?");
        return;
    };
    let (obj_name, value) = match rest.split_once('=') {
        Some((o, v)) => (o.trim(), v.trim()),
        None => (rest.trim(), ""),
    };
    let Some(target) = match_or_complain(ctx, env.executor, obj_name) else {
        return;
    };
    let num = ctx.world.registry.resolve_or_define(attr_name);
    set_attr_or_complain(ctx, env.executor, target, num, value);
}

fn set_attr_or_complain(ctx: &mut Ctx<'_>, actor: Dbref, target: Dbref, num: u16, value: &str) {
    if value.is_empty() {
        if !perms::can_set_attr(ctx.world, ctx.evaluator, actor, target, num) {
            ctx.world.notify(actor, "Permission denied.");
            return;
        }
        let _ = ctx.world.graph.clear_attr(target, num);
        ctx.world.persist_obj(target);
        ctx.world.notify(actor, "Cleared.");
        return;
    }
    match perms::set_attr_checked(ctx.world, ctx.evaluator, actor, target, num, value) {
        Ok(()) => ctx.world.notify(actor, "Set."),
        Err(_) => ctx.world.notify(actor, "Permission denied."),
    }
}

fn lock_kind_from_switches(env: &CmdEnv) -> LockKind {
    for (name, kind) in [
        ("enter", LockKind::Enter),
        ("leave", LockKind::Leave),
        ("use", LockKind::Use),
        ("give", LockKind::Give),
        ("receive", LockKind::Receive),
    ] {
        if env.has_switch(name) {
            return kind;
        }
    }
    LockKind::Default
}

fn do_lock(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(key_text) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Lock it to what?");
        return;
    };
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    // Names in the key resolve relative to the locker.
    let parsed = {
        let world = &*ctx.world;
        let executor = env.executor;
        let resolver = move |name: &str| {
            let m = matching::match_object(world, executor, name);
            if m.is_valid() {
                m
            } else {
                world.graph.lookup_player(name).unwrap_or(NOTHING)
            }
        };
        parse_lock(key_text, &resolver)
    };
    let expr = match parsed {
        Ok(expr) => expr,
        Err(_) => {
            ctx.world.notify(env.executor, "I don't understand that key.");
            return;
        }
    };
    let kind = lock_kind_from_switches(env);
    let _ = ctx.world.graph.set_attr_raw(
        target,
        kind.lock_attr(),
        expr.to_canonical_string(),
        env.executor,
        BitEnum::new(),
    );
    ctx.world.persist_obj(target);
    ctx.world.notify(env.executor, "Locked.");
}

fn do_unlock(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    let kind = lock_kind_from_switches(env);
    let _ = ctx.world.graph.clear_attr(target, kind.lock_attr());
    ctx.world.persist_obj(target);
    ctx.world.notify(env.executor, "Unlocked.");
}

fn do_zone(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !controls_or_complain(ctx, env.executor, target) {
        return;
    }
    match env.rhs.as_ref().filter(|r| !r.is_empty()) {
        None => {
            if let Some(o) = ctx.world.graph.get_mut(target) {
                o.zone = NOTHING;
            }
            ctx.world.notify(env.executor, "Zone cleared.");
        }
        Some(zone_name) => {
            let Some(zone) = match_or_complain(ctx, env.executor, zone_name) else {
                return;
            };
            if !controls_or_complain(ctx, env.executor, zone) {
                return;
            }
            if let Some(o) = ctx.world.graph.get_mut(target) {
                o.zone = zone;
            }
            ctx.world.notify(env.executor, "Zone set.");
        }
    }
    ctx.world.persist_obj(target);
}

fn do_teleport(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    // @teleport dest, or @teleport obj=dest.
    let (thing, dest_name) = match env.rhs.as_ref() {
        Some(rhs) => {
            let Some(thing) = match_or_complain(ctx, env.executor, &env.lhs) else {
                return;
            };
            (thing, rhs.clone())
        }
        None => (env.executor, env.lhs.clone()),
    };
    let dest = matching::match_object(ctx.world, env.executor, &dest_name);
    let dest = if dest.is_valid() {
        dest
    } else {
        match Dbref::parse(&dest_name) {
            Some(d) if ctx.world.graph.contains(d) => d,
            _ => {
                ctx.world.notify(env.executor, "I don't see that here.");
                return;
            }
        }
    };
    crate::movement::teleport(ctx, env.executor, thing, dest);
}

fn do_password(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let (Some(old), Some(new)) = (
        Some(env.lhs.as_str()).filter(|s| !s.is_empty()),
        env.rhs.as_deref().filter(|s| !s.is_empty()),
    ) else {
        ctx.world
            .notify(env.executor, "Usage: @password <old>=<new>");
        return;
    };
    let stored = ctx
        .world
        .graph
        .attr_text_direct(env.executor, A_PASS)
        .unwrap_or_default();
    if !login::verify_password(&stored, old) {
        ctx.world.notify(env.executor, "Sorry.");
        return;
    }
    let hash = login::hash_password(new);
    let _ = ctx
        .world
        .graph
        .set_attr_raw(env.executor, A_PASS, hash, env.executor, BitEnum::new());
    ctx.world.persist_obj(env.executor);
    ctx.world.notify(env.executor, "Password changed.");
}
