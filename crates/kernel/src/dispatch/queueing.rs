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

//! Deferred execution: waits, semaphores, triggers, halts, capture mode,
//! and the admin hammer.

use super::{CmdEnv, CommandDef, match_or_complain};
use crate::login;
use crate::perms;
use crate::sessions::ProgramCapture;
use crate::tasks::Ctx;
use marsh_common::attr::A_SEMAPHORE;
use marsh_common::util::{BitEnum, split_top_level_commas};
use marsh_common::{Dbref, NOTHING, Power};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub(super) fn register(table: &mut HashMap<&'static str, CommandDef>) {
    let defs = [
        CommandDef {
            name: "@wait",
            no_guest: false,
            handler: do_wait,
        },
        CommandDef {
            name: "@notify",
            no_guest: false,
            handler: do_notify,
        },
        CommandDef {
            name: "@drain",
            no_guest: false,
            handler: do_drain,
        },
        CommandDef {
            name: "@halt",
            no_guest: false,
            handler: do_halt,
        },
        CommandDef {
            name: "@trigger",
            no_guest: false,
            handler: do_trigger,
        },
        CommandDef {
            name: "@force",
            no_guest: true,
            handler: do_force,
        },
        CommandDef {
            name: "@program",
            no_guest: true,
            handler: do_program,
        },
        CommandDef {
            name: "@quitprogram",
            no_guest: false,
            handler: do_quitprogram,
        },
        CommandDef {
            name: "@boot",
            no_guest: true,
            handler: do_boot,
        },
    ];
    for def in defs {
        table.insert(def.name, def);
    }
}

/// Split `obj/attr`, defaulting the attribute to SEMAPHORE.
fn parse_obj_attr(ctx: &mut Ctx<'_>, looker: Dbref, spec: &str) -> Option<(Dbref, u16)> {
    let (obj_name, attr_name) = match spec.split_once('/') {
        Some((o, a)) => (o.trim(), Some(a.trim())),
        None => (spec.trim(), None),
    };
    let obj = match_or_complain(ctx, looker, obj_name)?;
    let num = match attr_name {
        Some(name) if !name.is_empty() => ctx.world.registry.resolve_or_define(name),
        _ => A_SEMAPHORE,
    };
    Some((obj, num))
}

fn semaphore_count(ctx: &Ctx<'_>, obj: Dbref, attr: u16) -> i64 {
    ctx.world
        .graph
        .attr_text_direct(obj, attr)
        .and_then(|t| t.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

fn set_semaphore_count(ctx: &mut Ctx<'_>, obj: Dbref, attr: u16, count: i64) {
    let owner = ctx.world.graph.get(obj).map(|o| o.owner).unwrap_or(NOTHING);
    let _ = ctx
        .world
        .graph
        .set_attr_raw(obj, attr, count.to_string(), owner, BitEnum::new());
    ctx.world.persist_obj(obj);
}

fn do_wait(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(command) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Wait for what?");
        return;
    };
    let entry = ctx.queues.make_entry(
        env.executor,
        env.enactor,
        env.caller,
        command.clone(),
        vec![],
        env.registers.clone(),
        true,
    );

    // Numeric form: @wait N=command.
    if let Ok(secs) = env.lhs.trim().parse::<f64>() {
        let secs = secs.max(0.0);
        ctx.queues
            .defer(entry, Instant::now() + Duration::from_secs_f64(secs));
        return;
    }

    // Semaphore form: @wait obj[/attr]=command.
    let Some((obj, attr)) = parse_obj_attr(ctx, env.executor, &env.lhs) else {
        return;
    };
    let count = semaphore_count(ctx, obj, attr) + 1;
    set_semaphore_count(ctx, obj, attr, count);
    if count > 0 {
        ctx.queues.wait_on_semaphore(entry, obj, attr);
    } else {
        ctx.queues.enqueue(entry);
    }
}

fn do_notify(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    // `@notify obj[/attr] [count]` — the count rides as a bare word.
    let mut words = env.arg.split_whitespace();
    let spec = words.next().unwrap_or_default().to_string();
    let count_word = words.next().map(str::to_string);
    let Some((obj, attr)) = parse_obj_attr(ctx, env.executor, &spec) else {
        return;
    };
    if !perms::controls(ctx.world, ctx.evaluator, env.executor, obj) {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let count: usize = if env.has_switch("all") {
        usize::MAX
    } else {
        count_word.and_then(|w| w.parse().ok()).unwrap_or(1)
    };
    let woken = ctx.queues.notify_semaphore(obj, attr, count);
    let old = semaphore_count(ctx, obj, attr);
    let new = if env.has_switch("all") {
        0
    } else {
        old - count.min(i64::MAX as usize) as i64
    };
    set_semaphore_count(ctx, obj, attr, new);
    ctx.world
        .notify(env.executor, format!("Notified ({woken} woken)."));
}

fn do_drain(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let attr_given = env.lhs.contains('/');
    let Some((obj, attr)) = parse_obj_attr(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !perms::controls(ctx.world, ctx.evaluator, env.executor, obj) {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let dropped = ctx
        .queues
        .drain_object(obj, attr_given.then_some(attr));
    set_semaphore_count(ctx, obj, attr, 0);
    ctx.world
        .notify(env.executor, format!("Drained ({dropped} dropped)."));
}

fn do_halt(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    if env.has_switch("all") {
        let wizard = ctx
            .world
            .graph
            .get(env.executor)
            .is_some_and(|o| o.is_wizard());
        if !wizard {
            ctx.world.notify(env.executor, "Permission denied.");
            return;
        }
        ctx.queues.halt_all();
        ctx.world.notify(env.executor, "Everything halted.");
        return;
    }
    let target = if env.arg.is_empty() {
        env.executor
    } else {
        match match_or_complain(ctx, env.executor, &env.lhs) {
            Some(t) => t,
            None => return,
        }
    };
    let can = perms::controls(ctx.world, ctx.evaluator, env.executor, target)
        || ctx
            .world
            .graph
            .get(env.executor)
            .is_some_and(|o| o.powers.contains(Power::Halt));
    if !can {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let dropped = ctx.queues.halt_player(target);
    ctx.world
        .notify(env.executor, format!("Halted ({dropped} entries dropped)."));
}

fn do_trigger(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some((obj_name, attr_name)) = env.lhs.split_once('/') else {
        ctx.world.notify(env.executor, "Trigger what?");
        return;
    };
    let Some(obj) = match_or_complain(ctx, env.executor, obj_name.trim()) else {
        return;
    };
    if !perms::controls(ctx.world, ctx.evaluator, env.executor, obj) {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let Some(def) = ctx.world.registry.resolve(attr_name.trim()) else {
        ctx.world.notify(env.executor, "No such attribute.");
        return;
    };
    let num = def.num;
    let Some(text) = ctx.world.graph.attr_text(&ctx.world.registry, obj, num) else {
        ctx.world.notify(env.executor, "No such attribute.");
        return;
    };
    // Arguments split on top-level commas, braces and parens respected.
    let args: Vec<String> = env
        .rhs
        .as_ref()
        .map(|r| split_top_level_commas(r))
        .unwrap_or_default()
        .into_iter()
        .take(10)
        .collect();
    let entry = ctx.queues.make_entry(
        obj,
        env.executor,
        env.executor,
        text,
        args,
        env.registers.clone(),
        true,
    );
    ctx.queues.enqueue(entry);
}

fn do_force(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(command) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Force what?");
        return;
    };
    let Some(target) = match_or_complain(ctx, env.executor, &env.lhs) else {
        return;
    };
    if !perms::controls(ctx.world, ctx.evaluator, env.executor, target) {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let entry = ctx.queues.make_entry(
        target,
        env.executor,
        env.executor,
        command.clone(),
        vec![],
        vec![],
        false,
    );
    ctx.queues.enqueue(entry);
}

/// `@program player=obj/attr`: arm capture-next-line on every descriptor
/// the player has.
fn do_program(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let Some(spec) = env.rhs.as_ref().filter(|r| !r.is_empty()) else {
        ctx.world.notify(env.executor, "Program whom with what?");
        return;
    };
    let Some(player) = ctx.world.graph.lookup_player(&env.lhs) else {
        ctx.world.notify(env.executor, "I don't recognize that name.");
        return;
    };
    if !perms::controls(ctx.world, ctx.evaluator, env.executor, player) {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    if !ctx.world.conns.is_connected(player) {
        ctx.world.notify(env.executor, "That player is not connected.");
        return;
    }
    let Some((obj_name, attr_name)) = spec.split_once('/') else {
        ctx.world.notify(env.executor, "Program whom with what?");
        return;
    };
    let Some(obj) = match_or_complain(ctx, env.executor, obj_name.trim()) else {
        return;
    };
    let Some(def) = ctx.world.registry.resolve(attr_name.trim()) else {
        ctx.world.notify(env.executor, "No such attribute.");
        return;
    };
    let num = def.num;
    if ctx
        .world
        .graph
        .attr_text(&ctx.world.registry, obj, num)
        .is_none()
    {
        ctx.world.notify(env.executor, "No such attribute.");
        return;
    }
    ctx.world.conns.set_capture(player, ProgramCapture {
        obj,
        attr: num,
        registers: env.registers.clone(),
    });
    ctx.world.notify(env.executor, "Programmed.");
    ctx.world.notify(player, ">");
}

fn do_quitprogram(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    match ctx.world.conns.clear_capture(env.executor) {
        Some(_) => ctx.world.notify(env.executor, "Aborted."),
        None => ctx.world.notify(env.executor, "You are not in a program."),
    }
}

fn do_boot(ctx: &mut Ctx<'_>, env: &CmdEnv) {
    let is_wizard = ctx
        .world
        .graph
        .get(env.executor)
        .is_some_and(|o| o.is_wizard());
    let has_power = ctx
        .world
        .graph
        .get(env.executor)
        .is_some_and(|o| o.powers.contains(Power::Boot));
    if !is_wizard && !has_power {
        ctx.world.notify(env.executor, "Permission denied.");
        return;
    }
    let Some(target) = ctx.world.graph.lookup_player(&env.lhs) else {
        ctx.world.notify(env.executor, "I don't recognize that name.");
        return;
    };
    if !ctx.world.conns.is_connected(target) {
        ctx.world.notify(env.executor, "That player is not connected.");
        return;
    }
    login::boot_player(ctx, target, "You have been booted.");
    ctx.world.notify(env.executor, "Booted.");
}
