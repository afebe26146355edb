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

//! Room and object display: name/desc rendering, the lock-gated Succ/Fail
//! families, ConFormat/ExitFormat overrides, and the visibility rules for
//! contents and exits.

use crate::eval::Frame;
use crate::locks::{self, handle_lock_failure};
use crate::perms;
use crate::tasks::Ctx;
use marsh_common::attr::{
    A_ASUCC, A_CONFORMAT, A_DESC, A_EXITFORMAT, A_NAMEFORMAT, A_OSUCC, A_SUCC, LockKind,
};
use marsh_common::{Dbref, FlagGlyphs, ObjFlag, ObjectKind, Power};

/// Contents visibility: the viewer is excluded, Going objects are excluded,
/// Dark things hide from non-controllers without SeeAll, players show only
/// while connected, Dark wizards hide from non-wizards, Unfindable hides.
#[must_use]
pub fn visible_contents(ctx: &Ctx<'_>, viewer: Dbref, room: Dbref) -> Vec<Dbref> {
    let viewer_is_wizard = ctx
        .world
        .graph
        .get(viewer)
        .is_some_and(|o| o.is_wizard());
    let see_all = ctx
        .world
        .graph
        .get(viewer)
        .is_some_and(|o| o.powers.contains(Power::SeeAll));

    ctx.world
        .graph
        .contents_of(room)
        .into_iter()
        .filter(|d| {
            if *d == viewer {
                return false;
            }
            let Some(obj) = ctx.world.graph.get(*d) else {
                return false;
            };
            if obj.is_going() {
                return false;
            }
            match obj.kind {
                ObjectKind::Player => {
                    if !ctx.world.conns.is_connected(*d) {
                        return false;
                    }
                    if obj.is_dark() && obj.is_wizard() && !viewer_is_wizard {
                        return false;
                    }
                    if obj.flags.contains(ObjFlag::Unfindable) {
                        return false;
                    }
                    true
                }
                _ => {
                    if obj.is_dark() {
                        return see_all
                            || perms::controls(ctx.world, ctx.evaluator, viewer, *d);
                    }
                    true
                }
            }
        })
        .collect()
}

/// Exit visibility: Dark exits never show; in a Dark room only Light exits
/// show.
#[must_use]
pub fn visible_exits(ctx: &Ctx<'_>, room: Dbref) -> Vec<Dbref> {
    let room_dark = ctx.world.graph.get(room).is_some_and(|o| o.is_dark());
    ctx.world
        .graph
        .exits_of(room)
        .into_iter()
        .filter(|d| {
            let Some(exit) = ctx.world.graph.get(*d) else {
                return false;
            };
            if exit.is_going() || exit.is_dark() {
                return false;
            }
            if room_dark && !exit.flags.contains(ObjFlag::Light) {
                return false;
            }
            true
        })
        .collect()
}

fn eval_attr(ctx: &Ctx<'_>, executor: Dbref, enactor: Dbref, num: u16, args: &[String]) -> Option<String> {
    let text = ctx
        .world
        .graph
        .attr_text(&ctx.world.registry, executor, num)?;
    if text.is_empty() {
        return None;
    }
    let frame = Frame::new(executor, enactor);
    let out = ctx.evaluator.exec(ctx.world, &frame, &text, args);
    (!out.is_empty()).then_some(out)
}

/// The full room presentation contract.
pub fn show_room(ctx: &mut Ctx<'_>, viewer: Dbref, room: Dbref) {
    if !room.is_valid() || !ctx.world.graph.contains(room) {
        ctx.world.notify(viewer, "You are nowhere.");
        return;
    }

    // Name line: NameFormat wins when it produces output.
    let name_line = match eval_attr(ctx, room, viewer, A_NAMEFORMAT, &[]) {
        Some(line) => line,
        None => {
            let obj = ctx.world.graph.get(room).expect("checked above");
            if perms::controls(ctx.world, ctx.evaluator, viewer, room) {
                format!(
                    "{}(#{}{})",
                    obj.display_name(),
                    room.id(),
                    FlagGlyphs {
                        kind: obj.kind,
                        flags: obj.flags
                    }
                )
            } else {
                obj.display_name().to_string()
            }
        }
    };
    ctx.world.notify(viewer, name_line);

    if let Some(desc) = eval_attr(ctx, room, viewer, A_DESC, &[]) {
        ctx.world.notify(viewer, desc);
    }

    // The room's own lock gates the Succ/Fail presentation, not entry.
    let mut custom_presentation = false;
    if locks::could_do_it(ctx.world, ctx.evaluator, viewer, room, LockKind::Default) {
        if let Some(succ) = eval_attr(ctx, room, viewer, A_SUCC, &[]) {
            ctx.world.notify(viewer, succ);
            // A non-empty Succ is a custom presentation; the default
            // contents/exits lists stand down.
            custom_presentation = true;
        }
        if let Some(osucc) = eval_attr(ctx, room, viewer, A_OSUCC, &[]) {
            let name = ctx.world.name_of(viewer);
            ctx.world
                .notify_room_except(room, &[viewer], &format!("{name} {osucc}"));
        }
        if let Some(text) = ctx.world.graph.attr_text(&ctx.world.registry, room, A_ASUCC)
            && !text.is_empty()
        {
            let entry = ctx
                .queues
                .make_entry(room, viewer, room, text, vec![], vec![], true);
            ctx.queues.enqueue(entry);
        }
    } else {
        handle_lock_failure(ctx, viewer, room, LockKind::Default, "");
    }

    if custom_presentation {
        return;
    }

    // Contents: ConFormat override, else the default listing.
    let contents = visible_contents(ctx, viewer, room);
    let dbref_arg: String = contents
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    match eval_attr(ctx, room, viewer, A_CONFORMAT, &[dbref_arg]) {
        Some(line) => ctx.world.notify(viewer, line),
        None if !contents.is_empty() => {
            ctx.world.notify(viewer, "Contents:");
            for d in &contents {
                let line = ctx.world.name_of(*d);
                ctx.world.notify(viewer, line);
            }
        }
        None => {}
    }

    // Exits: ExitFormat override, else the default listing.
    let exits = visible_exits(ctx, room);
    let dbref_arg: String = exits
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    match eval_attr(ctx, room, viewer, A_EXITFORMAT, &[dbref_arg]) {
        Some(line) => ctx.world.notify(viewer, line),
        None if !exits.is_empty() => {
            let names: Vec<String> = exits
                .iter()
                .filter_map(|d| ctx.world.graph.get(*d))
                .map(|o| o.display_name().to_string())
                .collect();
            ctx.world
                .notify(viewer, format!("Obvious exits: {}", names.join("  ")));
        }
        None => {}
    }
}

/// Look at a single object: its desc, or the stock nothing-special line.
pub fn show_thing(ctx: &mut Ctx<'_>, viewer: Dbref, thing: Dbref) {
    match eval_attr(ctx, thing, viewer, A_DESC, &[]) {
        Some(desc) => ctx.world.notify(viewer, desc),
        None => ctx.world.notify(viewer, "You see nothing special."),
    }
    // Looking at an open container shows what's inside.
    let kind = ctx.world.graph.get(thing).map(|o| o.kind);
    if kind == Some(ObjectKind::Thing)
        && ctx
            .world
            .graph
            .get(thing)
            .is_some_and(|o| o.flags.contains(ObjFlag::EnterOk))
    {
        let contents = visible_contents(ctx, viewer, thing);
        if !contents.is_empty() {
            ctx.world.notify(viewer, "Contents:");
            for d in contents {
                let line = ctx.world.name_of(d);
                ctx.world.notify(viewer, line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use crate::sessions::{MockSession, TransportKind};
    use crate::tasks::Queues;
    use crate::world::World;
    use marsh_common::NOTHING;
    use marsh_common::attr::A_LOCK;
    use marsh_common::util::BitEnum;
    use std::sync::Arc;

    fn fixture() -> (World, Queues, Dbref, Dbref, Arc<MockSession>) {
        let mut world = World::scratch();
        let god = marsh_common::GOD;
        let room = world.graph.create_object(ObjectKind::Room, "Hall", god);
        let p = world
            .graph
            .create_object(ObjectKind::Player, "Otter", NOTHING);
        world.graph.get_mut(p).unwrap().owner = p;
        world.graph.add_to_contents(p, room).unwrap();
        let session = MockSession::new();
        let conns = world.conns.clone();
        let id = conns.new_connection(TransportKind::StreamLine, "test", session.clone());
        conns.login_complete(id, p, false);
        world.bus.attach(id, session.clone());
        world.bus.bind_player(id, p);
        (world, Queues::new(100), room, p, session)
    }

    #[test]
    fn test_room_name_desc_and_exits() {
        let (mut world, mut queues, room, p, session) = fixture();
        let r2 = world
            .graph
            .create_object(ObjectKind::Room, "Annex", marsh_common::GOD);
        let exit = world
            .graph
            .create_object(ObjectKind::Exit, "North;n", marsh_common::GOD);
        world.graph.get_mut(exit).unwrap().location = r2;
        world.graph.add_exit(exit, room).unwrap();
        world
            .graph
            .set_attr_raw(room, A_DESC, "A dusty hall.", NOTHING, BitEnum::new())
            .unwrap();

        let mut ctx = Ctx {
            world: &mut world,
            queues: &mut queues,
            evaluator: &SubstEvaluator,
        };
        show_room(&mut ctx, p, room);
        let lines = session.lines();
        assert_eq!(lines[0], "Hall");
        assert_eq!(lines[1], "A dusty hall.");
        assert!(lines.iter().any(|l| l == "Obvious exits: North"));
    }

    #[test]
    fn test_nonempty_succ_suppresses_listings() {
        let (mut world, mut queues, room, p, session) = fixture();
        let rock = world
            .graph
            .create_object(ObjectKind::Thing, "rock", marsh_common::GOD);
        world.graph.add_to_contents(rock, room).unwrap();
        world
            .graph
            .set_attr_raw(room, A_SUCC, "A custom view.", NOTHING, BitEnum::new())
            .unwrap();

        let mut ctx = Ctx {
            world: &mut world,
            queues: &mut queues,
            evaluator: &SubstEvaluator,
        };
        show_room(&mut ctx, p, room);
        let lines = session.lines();
        assert!(lines.contains(&"A custom view.".to_string()));
        assert!(!lines.iter().any(|l| l == "Contents:"));
    }

    #[test]
    fn test_failed_lock_still_lists_defaults() {
        let (mut world, mut queues, room, p, session) = fixture();
        let rock = world
            .graph
            .create_object(ObjectKind::Thing, "rock", marsh_common::GOD);
        world.graph.add_to_contents(rock, room).unwrap();
        world
            .graph
            .set_attr_raw(room, A_LOCK, "#99", NOTHING, BitEnum::new())
            .unwrap();
        world
            .graph
            .set_attr_raw(room, A_SUCC, "Never shown.", NOTHING, BitEnum::new())
            .unwrap();

        let mut ctx = Ctx {
            world: &mut world,
            queues: &mut queues,
            evaluator: &SubstEvaluator,
        };
        show_room(&mut ctx, p, room);
        let lines = session.lines();
        assert!(!lines.contains(&"Never shown.".to_string()));
        assert!(lines.iter().any(|l| l == "Contents:"));
        assert!(lines.contains(&"rock".to_string()));
    }

    #[test]
    fn test_conformat_overrides_contents() {
        let (mut world, mut queues, room, p, session) = fixture();
        let rock = world
            .graph
            .create_object(ObjectKind::Thing, "rock", marsh_common::GOD);
        world.graph.add_to_contents(rock, room).unwrap();
        world
            .graph
            .set_attr_raw(room, A_CONFORMAT, "Stuff: %0", NOTHING, BitEnum::new())
            .unwrap();

        let mut ctx = Ctx {
            world: &mut world,
            queues: &mut queues,
            evaluator: &SubstEvaluator,
        };
        show_room(&mut ctx, p, room);
        let lines = session.lines();
        assert!(lines.contains(&format!("Stuff: {rock}")));
        assert!(!lines.iter().any(|l| l == "Contents:"));
    }

    #[test]
    fn test_dark_exit_hidden() {
        let (mut world, mut queues, room, p, session) = fixture();
        let r2 = world
            .graph
            .create_object(ObjectKind::Room, "Annex", marsh_common::GOD);
        let exit = world
            .graph
            .create_object(ObjectKind::Exit, "Secret", marsh_common::GOD);
        world.graph.get_mut(exit).unwrap().location = r2;
        world.graph.get_mut(exit).unwrap().flags.set(ObjFlag::Dark);
        world.graph.add_exit(exit, room).unwrap();

        let mut ctx = Ctx {
            world: &mut world,
            queues: &mut queues,
            evaluator: &SubstEvaluator,
        };
        show_room(&mut ctx, p, room);
        assert!(!session.lines().iter().any(|l| l.contains("Secret")));
    }

    #[test]
    fn test_disconnected_players_hidden() {
        let (mut world, mut queues, room, p, session) = fixture();
        let ghost = world
            .graph
            .create_object(ObjectKind::Player, "Ghost", NOTHING);
        world.graph.get_mut(ghost).unwrap().owner = ghost;
        world.graph.add_to_contents(ghost, room).unwrap();

        let mut ctx = Ctx {
            world: &mut world,
            queues: &mut queues,
            evaluator: &SubstEvaluator,
        };
        show_room(&mut ctx, p, room);
        assert!(!session.lines().iter().any(|l| l.contains("Ghost")));
    }
}
