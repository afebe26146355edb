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

use super::{BoolExpr, parse_lock};
use crate::eval::{Evaluator, Frame};
use crate::tasks::Ctx;
use crate::triggers;
use crate::world::World;
use marsh_common::attr::{A_LOCK, LockKind};
use marsh_common::util::wild_match;
use marsh_common::{Dbref, GOD, Power};
use tracing::debug;

/// Indirection cap for `@` locks. Past this, everything fails closed.
pub const MAX_LOCK_DEPTH: usize = 20;

/// Evaluate a parsed lock with the classic quadruple: the player being
/// tested, the thing the lock lives on, the actor whose action triggered
/// the test, and the indirection depth.
pub fn eval_bool(
    world: &World,
    evaluator: &dyn Evaluator,
    expr: &BoolExpr,
    tested: Dbref,
    lock_owner: Dbref,
    actor: Dbref,
    depth: usize,
) -> bool {
    if depth > MAX_LOCK_DEPTH {
        return false;
    }
    match expr {
        BoolExpr::Ref(target) => tested == *target || carries(world, tested, *target),
        BoolExpr::Attr { name, pat } => {
            attr_matches(world, tested, name, pat)
                || world
                    .graph
                    .contents_of(tested)
                    .into_iter()
                    .any(|item| attr_matches(world, item, name, pat))
        }
        BoolExpr::Eval { name, pat } => {
            let Some(num) = world.registry.resolve(name).map(|d| d.num) else {
                return false;
            };
            let Some(text) = world.graph.attr_text(&world.registry, actor, num) else {
                return false;
            };
            let mut frame = Frame::new(actor, tested);
            frame.depth = depth + 1;
            let result = evaluator.exec(world, &frame, &text, &[]);
            wild_match(pat, &result)
        }
        BoolExpr::Indirect(inner) => {
            let BoolExpr::Ref(via) = inner.as_ref() else {
                return false;
            };
            let Some(text) = world.graph.attr_text(&world.registry, *via, A_LOCK) else {
                // No lock on the referent: the indirection passes.
                return true;
            };
            if text.trim().is_empty() {
                return true;
            }
            let resolver = player_resolver(world);
            match parse_lock(&text, &resolver) {
                Ok(parsed) => {
                    eval_bool(world, evaluator, &parsed, tested, *via, actor, depth + 1)
                }
                Err(e) => {
                    debug!(?via, ?e, "indirect lock failed to parse");
                    false
                }
            }
        }
        BoolExpr::Carry(inner) => match inner.as_ref() {
            BoolExpr::Ref(target) => carries(world, tested, *target),
            BoolExpr::Attr { name, pat } => world
                .graph
                .contents_of(tested)
                .into_iter()
                .any(|item| attr_matches(world, item, name, pat)),
            _ => false,
        },
        BoolExpr::Is(inner) => match inner.as_ref() {
            BoolExpr::Ref(target) => tested == *target,
            BoolExpr::Attr { name, pat } => attr_matches(world, tested, name, pat),
            _ => false,
        },
        BoolExpr::Owner(inner) => match inner.as_ref() {
            BoolExpr::Ref(target) => {
                let tested_owner = world.graph.get(tested).map(|o| o.owner);
                let target_owner = world.graph.get(*target).map(|o| o.owner);
                matches!((tested_owner, target_owner), (Some(a), Some(b)) if a == b)
            }
            _ => false,
        },
        BoolExpr::Not(x) => !eval_bool(world, evaluator, x, tested, lock_owner, actor, depth),
        BoolExpr::And(a, b) => {
            eval_bool(world, evaluator, a, tested, lock_owner, actor, depth)
                && eval_bool(world, evaluator, b, tested, lock_owner, actor, depth)
        }
        BoolExpr::Or(a, b) => {
            eval_bool(world, evaluator, a, tested, lock_owner, actor, depth)
                || eval_bool(world, evaluator, b, tested, lock_owner, actor, depth)
        }
    }
}

fn carries(world: &World, holder: Dbref, target: Dbref) -> bool {
    world.graph.contents_of(holder).contains(&target)
}

fn attr_matches(world: &World, obj: Dbref, name: &str, pat: &str) -> bool {
    let Some(num) = world.registry.resolve(name).map(|d| d.num) else {
        return false;
    };
    match world.graph.attr_text(&world.registry, obj, num) {
        Some(text) => wild_match(pat, &text),
        None => false,
    }
}

/// Name resolver for stored lock text: `#n` is handled by the parser, so
/// this only sees names, which resolve through the player index.
pub fn player_resolver(world: &World) -> impl Fn(&str) -> Dbref + '_ {
    |name: &str| {
        let name = name.strip_prefix('*').unwrap_or(name);
        world
            .graph
            .lookup_player(name)
            .unwrap_or(marsh_common::NOTHING)
    }
}

/// Fetch, parse, and evaluate the lock stored in `lock_attr` on `thing`.
/// An absent lock fails (callers that want absent-passes check first).
pub fn eval_lock_text(
    world: &World,
    evaluator: &dyn Evaluator,
    thing: Dbref,
    lock_attr: u16,
    tested: Dbref,
    actor: Dbref,
    depth: usize,
) -> bool {
    let Some(text) = world.graph.attr_text(&world.registry, thing, lock_attr) else {
        return false;
    };
    if text.trim().is_empty() {
        return false;
    }
    let resolver = player_resolver(world);
    match parse_lock(&text, &resolver) {
        Ok(parsed) => eval_bool(world, evaluator, &parsed, tested, thing, actor, depth),
        Err(e) => {
            debug!(?thing, lock_attr, ?e, "stored lock failed to parse");
            false
        }
    }
}

/// `CouldDoIt`: the permissive entry point. Wizards pass everything except
/// locks on God; the PassLocks power bypasses all locks; an empty lock
/// passes everyone.
pub fn could_do_it(
    world: &World,
    evaluator: &dyn Evaluator,
    actor: Dbref,
    thing: Dbref,
    kind: LockKind,
) -> bool {
    if world
        .graph
        .get(actor)
        .is_some_and(|o| o.powers.contains(Power::PassLocks))
    {
        return true;
    }
    if world.graph.get(actor).is_some_and(|o| o.is_wizard()) && thing != GOD {
        return true;
    }
    could_do_it_strict(world, evaluator, actor, thing, kind)
}

/// `CouldDoItStrict`: same semantics minus the wizard bypass.
pub fn could_do_it_strict(
    world: &World,
    evaluator: &dyn Evaluator,
    actor: Dbref,
    thing: Dbref,
    kind: LockKind,
) -> bool {
    let attr = kind.lock_attr();
    match world.graph.attr_text(&world.registry, thing, attr) {
        None => true,
        Some(text) if text.trim().is_empty() => true,
        Some(_) => eval_lock_text(world, evaluator, thing, attr, actor, actor, 0),
    }
}

/// On lock failure: FAIL (or the supplied default) to the actor, OFAIL to
/// the room, AFAIL enqueued.
pub fn handle_lock_failure(
    ctx: &mut Ctx<'_>,
    actor: Dbref,
    thing: Dbref,
    kind: LockKind,
    default_fail: &str,
) {
    let (fail, ofail, afail) = kind.fail_attrs();
    let default = if default_fail.is_empty() {
        None
    } else {
        Some(default_fail)
    };
    triggers::did_it(ctx, actor, thing, fail, default, ofail, None, afail);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use marsh_common::attr::A_SEX;
    use marsh_common::util::BitEnum;
    use marsh_common::{NOTHING, ObjFlag, ObjectKind};

    fn fixture() -> (World, Dbref, Dbref) {
        let mut w = World::scratch();
        let p3 = w.graph.create_object(ObjectKind::Player, "Three", NOTHING);
        w.graph.get_mut(p3).unwrap().owner = p3;
        let p6 = w.graph.create_object(ObjectKind::Player, "Six", NOTHING);
        w.graph.get_mut(p6).unwrap().owner = p6;
        (w, p3, p6)
    }

    fn eval_text(w: &World, text: &str, tested: Dbref) -> bool {
        let resolver = player_resolver(w);
        let parsed = parse_lock(text, &resolver).unwrap();
        eval_bool(w, &SubstEvaluator, &parsed, tested, NOTHING, tested, 0)
    }

    #[test]
    fn test_compound_lock_with_carry_ban() {
        let (mut w, p3, p6) = fixture();
        let five = w.graph.create_object(ObjectKind::Thing, "five", p3);
        // Force the dbrefs the expression names.
        let text = format!("(#{}|#4)&!+#{}", p3.id(), five.id());

        assert!(eval_text(&w, &text, p3));
        assert!(!eval_text(&w, &text, p6));
        // Carrying the banned object flips the answer.
        w.graph.add_to_contents(five, p3).unwrap();
        assert!(!eval_text(&w, &text, p3));
    }

    #[test]
    fn test_carry_and_is_and_owner() {
        let (mut w, p3, p6) = fixture();
        let token = w.graph.create_object(ObjectKind::Thing, "token", p6);
        w.graph.add_to_contents(token, p3).unwrap();

        assert!(eval_text(&w, &format!("+#{}", token.id()), p3));
        assert!(!eval_text(&w, &format!("+#{}", token.id()), p6));
        // `=` is identity only, not carry.
        assert!(!eval_text(&w, &format!("=#{}", token.id()), p3));
        assert!(eval_text(&w, &format!("=#{}", p3.id()), p3));
        // `$` compares owners: the token is owned by p6.
        assert!(eval_text(&w, &format!("$#{}", token.id()), p6));
        assert!(!eval_text(&w, &format!("$#{}", token.id()), p3));
    }

    #[test]
    fn test_attr_pattern_leaf() {
        let (mut w, p3, p6) = fixture();
        w.graph
            .set_attr_raw(p3, A_SEX, "male", NOTHING, BitEnum::new())
            .unwrap();
        assert!(eval_text(&w, "sex:m*", p3));
        assert!(!eval_text(&w, "sex:f*", p3));
        assert!(!eval_text(&w, "sex:m*", p6));
    }

    #[test]
    fn test_indirect_lock_and_depth_cap() {
        let (mut w, p3, _p6) = fixture();
        let gate = w.graph.create_object(ObjectKind::Thing, "gate", p3);
        // The gate's own lock admits p3.
        w.graph
            .set_attr_raw(gate, A_LOCK, format!("#{}", p3.id()), NOTHING, BitEnum::new())
            .unwrap();
        assert!(eval_text(&w, &format!("@#{}", gate.id()), p3));

        // Self-referential indirection exhausts the depth cap and fails.
        w.graph
            .set_attr_raw(gate, A_LOCK, format!("@#{}", gate.id()), NOTHING, BitEnum::new())
            .unwrap();
        assert!(!eval_text(&w, &format!("@#{}", gate.id()), p3));
    }

    #[test]
    fn test_depth_exceeded_returns_false_without_parsing() {
        let (w, p3, _) = fixture();
        let expr = BoolExpr::Ref(p3);
        assert!(!eval_bool(
            &w,
            &SubstEvaluator,
            &expr,
            p3,
            NOTHING,
            p3,
            MAX_LOCK_DEPTH + 1
        ));
    }

    #[test]
    fn test_unresolved_name_never_matches() {
        let (w, p3, _) = fixture();
        assert!(!eval_text(&w, "#-1", p3));
    }

    #[test]
    fn test_could_do_it_wizard_and_passlocks() {
        let (mut w, p3, p6) = fixture();
        let ev = SubstEvaluator;
        let thing = w.graph.create_object(ObjectKind::Thing, "door", p3);
        w.graph
            .set_attr_raw(thing, A_LOCK, "#-1", NOTHING, BitEnum::new())
            .unwrap();

        assert!(!could_do_it(&w, &ev, p6, thing, LockKind::Default));
        w.graph.get_mut(p6).unwrap().flags.set(ObjFlag::Wizard);
        assert!(could_do_it(&w, &ev, p6, thing, LockKind::Default));
        // But not against God.
        w.graph
            .set_attr_raw(GOD, A_LOCK, "#-1", NOTHING, BitEnum::new())
            .unwrap();
        assert!(!could_do_it(&w, &ev, p6, GOD, LockKind::Default));
        // Strict form ignores wizardliness.
        assert!(!could_do_it_strict(&w, &ev, p6, thing, LockKind::Default));
        // PassLocks bypasses everything.
        w.graph.get_mut(p3).unwrap().powers.set(Power::PassLocks);
        assert!(could_do_it(&w, &ev, p3, GOD, LockKind::Default));
    }

    #[test]
    fn test_empty_lock_passes() {
        let (w, p3, _) = fixture();
        let ev = SubstEvaluator;
        assert!(could_do_it_strict(&w, &ev, p3, GOD, LockKind::Enter));
    }
}
