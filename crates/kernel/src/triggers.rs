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

//! The message/action triple at the heart of most world feedback: a message
//! to the actor, an o-message to the room, and an action attribute queued on
//! the object. Success, failure, drop, enter, and leave messages all run
//! through [`did_it`].

use crate::eval::Frame;
use crate::tasks::Ctx;
use marsh_common::Dbref;
use marsh_common::attr::{A_AAHEAR, A_AHEAR, A_AMHEAR, A_LISTEN};
use marsh_common::util::wild_match_captures;

/// Fire the classic triple on `thing`, with `actor` as enactor:
/// - `what`: evaluated and shown to the actor (or `what_default`);
/// - `owhat`: evaluated and shown to the rest of the actor's room,
///   prefixed with the actor's name (or `owhat_default`);
/// - `awhat`: enqueued as an action for `thing` to run.
pub fn did_it(
    ctx: &mut Ctx<'_>,
    actor: Dbref,
    thing: Dbref,
    what: u16,
    what_default: Option<&str>,
    owhat: u16,
    owhat_default: Option<&str>,
    awhat: u16,
) {
    let mut frame = Frame::new(thing, actor);
    frame.caller = thing;

    match ctx.world.graph.attr_text(&ctx.world.registry, thing, what) {
        Some(text) if !text.is_empty() => {
            let msg = ctx.evaluator.exec(ctx.world, &frame, &text, &[]);
            if !msg.is_empty() {
                ctx.world.notify(actor, msg);
            }
        }
        _ => {
            if let Some(default) = what_default
                && !default.is_empty()
            {
                ctx.world.notify(actor, default);
            }
        }
    }

    let room = ctx
        .world
        .graph
        .get(actor)
        .map(|o| o.location)
        .unwrap_or(marsh_common::NOTHING);
    if room.is_valid() {
        let actor_name = ctx.world.name_of(actor);
        let omsg = match ctx.world.graph.attr_text(&ctx.world.registry, thing, owhat) {
            Some(text) if !text.is_empty() => {
                let msg = ctx.evaluator.exec(ctx.world, &frame, &text, &[]);
                (!msg.is_empty()).then_some(msg)
            }
            _ => owhat_default.filter(|d| !d.is_empty()).map(String::from),
        };
        if let Some(omsg) = omsg {
            ctx.world
                .notify_room_except(room, &[actor], &format!("{actor_name} {omsg}"));
        }
    }

    if let Some(text) = ctx.world.graph.attr_text(&ctx.world.registry, thing, awhat)
        && !text.is_empty()
    {
        let entry = ctx
            .queues
            .make_entry(thing, actor, thing, text, vec![], vec![], true);
        ctx.queues.enqueue(entry);
    }
}

/// Listen-pattern matching: every object in `room` (other than the speaker)
/// whose LISTEN pattern matches the message gets its hear actions queued,
/// with the wildcard captures as `%0`..`%9`.
pub fn listen_scan(ctx: &mut Ctx<'_>, room: Dbref, speaker: Dbref, message: &str) {
    for item in ctx.world.graph.contents_of(room) {
        let Some(pat) = ctx
            .world
            .graph
            .attr_text(&ctx.world.registry, item, A_LISTEN)
        else {
            continue;
        };
        let Some(captures) = wild_match_captures(&pat, message) else {
            continue;
        };
        let mut captures = captures;
        captures.truncate(10);
        let hear = if item == speaker { A_AMHEAR } else { A_AHEAR };
        for attr in [hear, A_AAHEAR] {
            if let Some(text) = ctx.world.graph.attr_text(&ctx.world.registry, item, attr)
                && !text.is_empty()
            {
                let entry = ctx.queues.make_entry(
                    item,
                    speaker,
                    item,
                    text,
                    captures.clone(),
                    vec![],
                    true,
                );
                ctx.queues.enqueue(entry);
            }
        }
    }
}
