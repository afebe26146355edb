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

//! The permission algebra: who controls what, who may read or write which
//! attribute. Stateless functions over the world, parameterized by the
//! acting identity, so the evaluator and lock engine can re-enter them.

use crate::eval::Evaluator;
use crate::locks;
use crate::world::World;
use marsh_common::attr::{A_LCONTROL, AttrFlag, AttrValue, attr_flag_letters};
use marsh_common::{Dbref, GOD, NOTHING, ObjFlag, WorldError};

/// `Controls(actor, target)`: actor is target, owns it, out-wizards it, or
/// passes its control lock with ControlOk set. God controls everything and
/// is controlled by nobody else.
pub fn controls(world: &World, evaluator: &dyn Evaluator, actor: Dbref, target: Dbref) -> bool {
    if actor == GOD {
        return true;
    }
    if actor == target {
        return true;
    }
    let (Some(a), Some(t)) = (world.graph.get(actor), world.graph.get(target)) else {
        return false;
    };
    // Owner comparison: a player is their own owner, so this covers both
    // "actor owns target" and "actor's owner owns target" (puppets).
    let actor_owner = if a.owner.is_valid() { a.owner } else { actor };
    if actor_owner.is_valid() && actor_owner == t.owner {
        return true;
    }
    if a.is_wizard() && target != GOD {
        return true;
    }
    if t.flags.contains(ObjFlag::ControlOk)
        && world
            .graph
            .attr_text(&world.registry, target, A_LCONTROL)
            .is_some_and(|text| !text.is_empty())
        && locks::eval_lock_text(world, evaluator, target, A_LCONTROL, actor, actor, 0)
    {
        return true;
    }
    // Zone delegation: passing the zone object's control lock grants
    // control over everything in the zone.
    if t.zone.is_valid()
        && world
            .graph
            .attr_text(&world.registry, t.zone, A_LCONTROL)
            .is_some_and(|text| !text.is_empty())
        && locks::eval_lock_text(world, evaluator, t.zone, A_LCONTROL, actor, actor, 0)
    {
        return true;
    }
    false
}

/// `CanReadAttr`. Internal/Dark definition flags hide the attribute from
/// everyone but controllers; Visual opens it to the world; the attribute's
/// own owner always reads it.
pub fn can_read_attr(
    world: &World,
    evaluator: &dyn Evaluator,
    viewer: Dbref,
    obj: Dbref,
    num: u16,
    value: &AttrValue,
) -> bool {
    if controls(world, evaluator, viewer, obj) {
        return true;
    }
    let Some(def) = world.registry.get(num) else {
        return false;
    };
    if def.flags.contains(AttrFlag::Internal) || def.flags.contains(AttrFlag::Dark) {
        return false;
    }
    if def.flags.contains(AttrFlag::Visual) {
        return true;
    }
    attr_owner(world, obj, value) == viewer
}

/// `CanSetAttr`: control of the object plus whatever tier the combined
/// (definition | instance) flags demand.
pub fn can_set_attr(
    world: &World,
    evaluator: &dyn Evaluator,
    actor: Dbref,
    obj: Dbref,
    num: u16,
) -> bool {
    if !controls(world, evaluator, actor, obj) {
        return false;
    }
    let def_flags = world
        .registry
        .get(num)
        .map(|d| d.flags)
        .unwrap_or_default();
    let inst_flags = world
        .graph
        .attr_direct(obj, num)
        .map(|v| v.flags)
        .unwrap_or_default();
    let combined = def_flags | inst_flags;

    if combined.contains(AttrFlag::Const) && actor != GOD {
        return false;
    }
    if (combined.contains(AttrFlag::Internal) || combined.contains(AttrFlag::GodOnly))
        && actor != GOD
    {
        return false;
    }
    if combined.contains(AttrFlag::WizOnly) {
        let wiz = world.graph.get(actor).map(|o| o.is_wizard()).unwrap_or(false);
        if !wiz && actor != GOD {
            return false;
        }
    }
    true
}

/// `SetAttrChecked`: the permissioned write path.
pub fn set_attr_checked(
    world: &mut World,
    evaluator: &dyn Evaluator,
    actor: Dbref,
    obj: Dbref,
    num: u16,
    value: &str,
) -> Result<(), WorldError> {
    if !can_set_attr(world, evaluator, actor, obj, num) {
        return Err(WorldError::PermissionDenied);
    }
    world.graph.set_attr(&world.registry, obj, num, value)?;
    world.persist_obj(obj);
    Ok(())
}

/// The effective owner of an attribute value: explicit owner when stored,
/// otherwise the object's owner.
#[must_use]
pub fn attr_owner(world: &World, obj: Dbref, value: &AttrValue) -> Dbref {
    if value.owner.is_valid() {
        value.owner
    } else {
        world.graph.get(obj).map(|o| o.owner).unwrap_or(NOTHING)
    }
}

/// The examine ownership/flags annotation, shown when the viewer controls
/// the object or owns the attribute: `[#owner instLetters(defLetters)]`.
#[must_use]
pub fn attr_annotation(
    world: &World,
    evaluator: &dyn Evaluator,
    viewer: Dbref,
    obj: Dbref,
    num: u16,
    value: &AttrValue,
) -> Option<String> {
    let owner = attr_owner(world, obj, value);
    if !controls(world, evaluator, viewer, obj) && owner != viewer {
        return None;
    }
    let def_letters = world
        .registry
        .get(num)
        .map(|d| attr_flag_letters(d.flags))
        .unwrap_or_default();
    Some(format!(
        "[#{} {}({})]",
        owner.id(),
        attr_flag_letters(value.flags),
        def_letters
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use marsh_common::ObjectKind;
    use marsh_common::attr::{A_DESC, A_PASS};
    use marsh_common::util::BitEnum;

    fn fixture() -> (World, Dbref, Dbref) {
        let mut w = World::scratch();
        let owner = w
            .graph
            .create_object(ObjectKind::Player, "Owner", NOTHING);
        {
            let o = w.graph.get_mut(owner).unwrap();
            o.owner = owner;
        }
        let thing = w.graph.create_object(ObjectKind::Thing, "Widget", owner);
        (w, owner, thing)
    }

    #[test]
    fn test_controls_ladder() {
        let (mut w, owner, thing) = fixture();
        let ev = SubstEvaluator;
        let stranger = w
            .graph
            .create_object(ObjectKind::Player, "Stranger", NOTHING);
        w.graph.get_mut(stranger).unwrap().owner = stranger;

        assert!(controls(&w, &ev, GOD, thing));
        assert!(controls(&w, &ev, owner, thing));
        assert!(controls(&w, &ev, thing, thing));
        assert!(!controls(&w, &ev, stranger, thing));
        // Wizards control everything but God.
        w.graph.get_mut(stranger).unwrap().flags.set(ObjFlag::Wizard);
        assert!(controls(&w, &ev, stranger, thing));
        assert!(!controls(&w, &ev, stranger, GOD));
    }

    #[test]
    fn test_zone_control_delegation() {
        let (mut w, owner, thing) = fixture();
        let ev = SubstEvaluator;
        let stranger = w
            .graph
            .create_object(ObjectKind::Player, "Stranger", NOTHING);
        w.graph.get_mut(stranger).unwrap().owner = stranger;
        let zone = w.graph.create_object(ObjectKind::Thing, "Zone", owner);
        w.graph.get_mut(thing).unwrap().zone = zone;
        assert!(!controls(&w, &ev, stranger, thing));
        w.graph
            .set_attr_raw(
                zone,
                A_LCONTROL,
                format!("#{}", stranger.id()),
                NOTHING,
                BitEnum::new(),
            )
            .unwrap();
        assert!(controls(&w, &ev, stranger, thing));
    }

    #[test]
    fn test_internal_attr_hidden_from_noncontrollers() {
        let (mut w, _owner, thing) = fixture();
        let ev = SubstEvaluator;
        let stranger = w
            .graph
            .create_object(ObjectKind::Player, "Stranger", NOTHING);
        w.graph.get_mut(stranger).unwrap().owner = stranger;
        w.graph
            .set_attr_raw(thing, A_PASS, "secret", NOTHING, BitEnum::new())
            .unwrap();
        let v = w.graph.attr_direct(thing, A_PASS).unwrap().clone();
        assert!(!can_read_attr(&w, &ev, stranger, thing, A_PASS, &v));
        assert!(can_read_attr(&w, &ev, GOD, thing, A_PASS, &v));
    }

    #[test]
    fn test_visual_attr_readable_by_all() {
        let (mut w, _owner, thing) = fixture();
        let ev = SubstEvaluator;
        let stranger = w
            .graph
            .create_object(ObjectKind::Player, "Stranger", NOTHING);
        w.graph.get_mut(stranger).unwrap().owner = stranger;
        w.graph
            .set_attr_raw(thing, A_DESC, "plain", NOTHING, BitEnum::new())
            .unwrap();
        let v = w.graph.attr_direct(thing, A_DESC).unwrap().clone();
        assert!(can_read_attr(&w, &ev, stranger, thing, A_DESC, &v));
    }

    #[test]
    fn test_set_attr_checked_denies_stranger() {
        let (mut w, _owner, thing) = fixture();
        let ev = SubstEvaluator;
        let stranger = w
            .graph
            .create_object(ObjectKind::Player, "Stranger", NOTHING);
        w.graph.get_mut(stranger).unwrap().owner = stranger;
        assert_eq!(
            set_attr_checked(&mut w, &ev, stranger, thing, A_DESC, "nope"),
            Err(WorldError::PermissionDenied)
        );
        assert!(set_attr_checked(&mut w, &ev, GOD, thing, A_DESC, "yes").is_ok());
    }

    #[test]
    fn test_annotation_rendering() {
        let (mut w, owner, thing) = fixture();
        let ev = SubstEvaluator;
        w.graph
            .set_attr_raw(
                thing,
                A_DESC,
                "x",
                owner,
                BitEnum::new_with(AttrFlag::NoClone),
            )
            .unwrap();
        let v = w.graph.attr_direct(thing, A_DESC).unwrap().clone();
        let ann = attr_annotation(&w, &ev, owner, thing, A_DESC, &v).unwrap();
        assert_eq!(ann, format!("[#{} Q(V)]", owner.id()));
    }
}
