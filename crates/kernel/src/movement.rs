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

//! Location transitions and their ordered trigger storm: leave messages on
//! the source, the transfer itself, arrival messages and the room display
//! on the destination, then listen scans.

use crate::locks::{self, handle_lock_failure};
use crate::look;
use crate::tasks::Ctx;
use crate::triggers::{self, did_it};
use marsh_common::attr::{
    A_AENTER, A_ALEAVE, A_ASUCC, A_OENTER, A_OLEAVE, A_OSUCC, A_SUCC, LockKind,
};
use marsh_common::{Dbref, HOME, NOTHING, ObjFlag, ObjectKind};

/// Attribute number meaning "no attribute" for a [`did_it`] slot.
const NO_ATTR: u16 = 0;

/// The full move: ordered per the trigger contract. Broadcast steps are
/// skipped for Dark movers.
pub fn move_player(ctx: &mut Ctx<'_>, player: Dbref, dest: Dbref) {
    if !dest.is_valid() || !ctx.world.graph.contains(dest) {
        ctx.world.notify(player, "You can't go that way.");
        return;
    }
    if ctx.world.graph.would_create_cycle(player, dest) {
        ctx.world.notify(player, "You can't go that way.");
        return;
    }
    let source = ctx
        .world
        .graph
        .get(player)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    let dark = ctx
        .world
        .graph
        .get(player)
        .is_some_and(|o| o.is_dark());
    let name = ctx.world.name_of(player);

    // Leave side: action trigger, then the o-message (OLeave or default).
    if source.is_valid() {
        let odefault = if dark { None } else { Some("has left.") };
        did_it(ctx, player, source, NO_ATTR, None, A_OLEAVE, odefault, A_ALEAVE);
    }

    if ctx.world.graph.remove_from_contents(player).is_err() {
        return;
    }
    if ctx.world.graph.add_to_contents(player, dest).is_err() {
        // Putting the object back where it was is the recovery path.
        let _ = ctx.world.graph.add_to_contents(player, source);
        ctx.world.notify(player, "You can't go that way.");
        return;
    }

    if !dark {
        ctx.world
            .notify_room_except(dest, &[player], &format!("{name} has arrived."));
    }

    ctx.world.persist_objs(&[source, player, dest]);

    look::show_room(ctx, player, dest);

    did_it(ctx, player, dest, NO_ATTR, None, A_OENTER, None, A_AENTER);

    triggers::listen_scan(ctx, dest, player, &format!("{name} has arrived."));
}

/// Walk through an exit: the exit's lock gates traversal, its Succ/OSucc/
/// ASucc triple fires on success, the Fail family on denial.
pub fn traverse_exit(ctx: &mut Ctx<'_>, player: Dbref, exit: Dbref) {
    if !locks::could_do_it(ctx.world, ctx.evaluator, player, exit, LockKind::Default) {
        handle_lock_failure(ctx, player, exit, LockKind::Default, "You can't go that way.");
        return;
    }
    did_it(ctx, player, exit, A_SUCC, None, A_OSUCC, None, A_ASUCC);
    let mut dest = ctx
        .world
        .graph
        .get(exit)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    if dest == HOME {
        dest = ctx
            .world
            .graph
            .get(player)
            .map(|o| o.link)
            .unwrap_or(NOTHING);
    }
    if !dest.is_valid() {
        ctx.world.notify(player, "That exit leads nowhere.");
        return;
    }
    move_player(ctx, player, dest);
}

/// Enter a thing via its EAlias or the `enter` command: EnterOk plus the
/// Enter lock.
pub fn enter_thing(ctx: &mut Ctx<'_>, player: Dbref, thing: Dbref) {
    let enter_ok = ctx
        .world
        .graph
        .get(thing)
        .is_some_and(|o| o.flags.contains(ObjFlag::EnterOk));
    let controls_it = crate::perms::controls(ctx.world, ctx.evaluator, player, thing);
    if !(enter_ok || controls_it)
        || !locks::could_do_it(ctx.world, ctx.evaluator, player, thing, LockKind::Enter)
    {
        handle_lock_failure(ctx, player, thing, LockKind::Enter, "You can't enter that.");
        return;
    }
    move_player(ctx, player, thing);
}

/// Leave the containing thing, dropping into its location. Gated by the
/// container's Leave lock.
pub fn leave_thing(ctx: &mut Ctx<'_>, player: Dbref) {
    let container = ctx
        .world
        .graph
        .get(player)
        .map(|o| o.location)
        .unwrap_or(NOTHING);
    let Some(cobj) = ctx.world.graph.get(container) else {
        ctx.world.notify(player, "You can't leave.");
        return;
    };
    if cobj.kind == ObjectKind::Room {
        ctx.world.notify(player, "You can't leave.");
        return;
    }
    let outer = cobj.location;
    if !locks::could_do_it(ctx.world, ctx.evaluator, player, container, LockKind::Leave) {
        handle_lock_failure(ctx, player, container, LockKind::Leave, "You can't leave.");
        return;
    }
    move_player(ctx, player, outer);
}

/// `@teleport`: control of the moved object, and either control of the
/// destination or its JumpOk flag.
pub fn teleport(ctx: &mut Ctx<'_>, actor: Dbref, thing: Dbref, dest: Dbref) {
    if !crate::perms::controls(ctx.world, ctx.evaluator, actor, thing) {
        ctx.world.notify(actor, "Permission denied.");
        return;
    }
    let jump_ok = ctx
        .world
        .graph
        .get(dest)
        .is_some_and(|o| o.flags.contains(ObjFlag::JumpOk));
    if !jump_ok && !crate::perms::controls(ctx.world, ctx.evaluator, actor, dest) {
        ctx.world.notify(actor, "Permission denied.");
        return;
    }
    let kind = ctx.world.graph.get(thing).map(|o| o.kind);
    if kind == Some(ObjectKind::Player) {
        move_player(ctx, thing, dest);
    } else {
        // Things relocate without the trigger storm.
        if ctx.world.graph.would_create_cycle(thing, dest) {
            ctx.world.notify(actor, "You can't put something inside itself.");
            return;
        }
        let source = ctx
            .world
            .graph
            .get(thing)
            .map(|o| o.location)
            .unwrap_or(NOTHING);
        let _ = ctx.world.graph.remove_from_contents(thing);
        let _ = ctx.world.graph.add_to_contents(thing, dest);
        ctx.world.persist_objs(&[source, thing, dest]);
        ctx.world.notify(actor, "Teleported.");
    }
}

/// The `home` command: run home through the link field.
pub fn send_home(ctx: &mut Ctx<'_>, player: Dbref) {
    let home = ctx
        .world
        .graph
        .get(player)
        .map(|o| o.link)
        .unwrap_or(NOTHING);
    if !home.is_valid() {
        ctx.world.notify(player, "You have no home.");
        return;
    }
    ctx.world.notify(player, "There's no place like home...");
    move_player(ctx, player, home);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use crate::sessions::{MockSession, TransportKind};
    use crate::tasks::Queues;
    use crate::world::World;
    use marsh_common::NOTHING;
    use marsh_common::attr::{A_LOCK, A_OSUCC, A_SUCC};
    use marsh_common::util::BitEnum;
    use std::sync::Arc;

    struct Fixture {
        world: World,
        queues: Queues,
        r: Dbref,
        r2: Dbref,
        exit: Dbref,
        p: Dbref,
        p_session: Arc<MockSession>,
        witness: Dbref,
        witness_session: Arc<MockSession>,
    }

    fn fixture() -> Fixture {
        let mut world = World::scratch();
        let god = marsh_common::GOD;
        let r = world.graph.create_object(ObjectKind::Room, "Hall", god);
        let r2 = world.graph.create_object(ObjectKind::Room, "Annex", god);
        let exit = world.graph.create_object(ObjectKind::Exit, "North;n", god);
        world.graph.get_mut(exit).unwrap().location = r2;
        world.graph.add_exit(exit, r).unwrap();

        let mut connect = |name: &str| {
            let p = world
                .graph
                .create_object(ObjectKind::Player, name, NOTHING);
            world.graph.get_mut(p).unwrap().owner = p;
            world.graph.add_to_contents(p, r).unwrap();
            let session = MockSession::new();
            let conns = world.conns.clone();
            let id = conns.new_connection(TransportKind::StreamLine, "test", session.clone());
            conns.login_complete(id, p, false);
            world.bus.attach(id, session.clone());
            world.bus.bind_player(id, p);
            (p, session)
        };
        let (p, p_session) = connect("Otter");
        let (witness, witness_session) = connect("Witness");

        Fixture {
            world,
            queues: Queues::new(100),
            r,
            r2,
            exit,
            p,
            p_session,
            witness,
            witness_session,
        }
    }

    impl Fixture {
        fn ctx(&mut self) -> Ctx<'_> {
            Ctx {
                world: &mut self.world,
                queues: &mut self.queues,
                evaluator: &SubstEvaluator,
            }
        }
    }

    #[test]
    fn test_exit_movement_with_succ_osucc() {
        let mut f = fixture();
        f.world
            .graph
            .set_attr_raw(f.exit, A_SUCC, "You head north.", NOTHING, BitEnum::new())
            .unwrap();
        f.world
            .graph
            .set_attr_raw(f.exit, A_OSUCC, "heads north.", NOTHING, BitEnum::new())
            .unwrap();

        let (p, exit) = (f.p, f.exit);
        let mut ctx = f.ctx();
        traverse_exit(&mut ctx, p, exit);

        let p_lines = f.p_session.lines();
        assert_eq!(p_lines[0], "You head north.");
        // ShowRoom output follows: room name first.
        assert!(p_lines.iter().any(|l| l.contains("Annex")));
        let w_lines = f.witness_session.lines();
        assert!(w_lines.contains(&"Otter heads north.".to_string()));
        assert!(w_lines.contains(&"Otter has left.".to_string()));
        // The mover really moved.
        assert_eq!(f.world.graph.get(f.p).unwrap().location, f.r2);
        assert!(f.world.graph.contents_of(f.r2).contains(&f.p));
        assert!(!f.world.graph.contents_of(f.r).contains(&f.p));
    }

    #[test]
    fn test_locked_exit_denies_with_default() {
        let mut f = fixture();
        f.world
            .graph
            .set_attr_raw(f.exit, A_LOCK, "#-1", NOTHING, BitEnum::new())
            .unwrap();
        let (p, exit) = (f.p, f.exit);
        let mut ctx = f.ctx();
        traverse_exit(&mut ctx, p, exit);
        assert_eq!(f.p_session.lines(), vec!["You can't go that way."]);
        assert_eq!(f.world.graph.get(f.p).unwrap().location, f.r);
    }

    #[test]
    fn test_locked_destination_room_still_renders_defaults() {
        // The destination's own lock gates Succ/Fail display, not entry,
        // and the default Contents/Exits still render.
        let mut f = fixture();
        f.world
            .graph
            .set_attr_raw(f.r2, A_LOCK, "#99", NOTHING, BitEnum::new())
            .unwrap();
        let (p, exit) = (f.p, f.exit);
        let mut ctx = f.ctx();
        traverse_exit(&mut ctx, p, exit);
        assert_eq!(f.world.graph.get(f.p).unwrap().location, f.r2);
        // Room name was shown despite the failed lock.
        assert!(f.p_session.lines().iter().any(|l| l.contains("Annex")));
    }

    #[test]
    fn test_move_is_cycle_safe() {
        let mut f = fixture();
        let bag = f
            .world
            .graph
            .create_object(ObjectKind::Thing, "bag", f.p);
        f.world.graph.add_to_contents(bag, f.p).unwrap();
        let p = f.p;
        let mut ctx = f.ctx();
        // A player cannot move into something they carry.
        move_player(&mut ctx, p, bag);
        assert_eq!(f.world.graph.get(f.p).unwrap().location, f.r);
    }

    #[test]
    fn test_send_home() {
        let mut f = fixture();
        f.world.graph.get_mut(f.p).unwrap().link = f.r2;
        let p = f.p;
        let mut ctx = f.ctx();
        send_home(&mut ctx, p);
        assert_eq!(f.world.graph.get(f.p).unwrap().location, f.r2);
    }

    #[test]
    fn test_witness_sees_arrival_in_dest() {
        let mut f = fixture();
        // Move the witness to the annex first so they see the arrival.
        let (p, witness, r2) = (f.p, f.witness, f.r2);
        {
            let mut ctx = f.ctx();
            move_player(&mut ctx, witness, r2);
        }
        f.witness_session.clear();
        f.p_session.clear();
        let mut ctx = f.ctx();
        move_player(&mut ctx, p, r2);
        assert!(
            f.witness_session
                .lines()
                .contains(&"Otter has arrived.".to_string())
        );
    }
}
