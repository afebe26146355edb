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

//! The softcode evaluator seam. The full expression language lives behind
//! the [`Evaluator`] trait; the runtime ships a substitution-only
//! implementation and treats anything richer as a drop-in replacement.

use crate::world::World;
use marsh_common::Dbref;

/// Identity triple plus depth for one evaluation: whose code runs
/// (executor), who set it off (enactor), who invoked this attribute
/// (caller). Depth is the re-entrancy guard shared with lock evaluation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub executor: Dbref,
    pub enactor: Dbref,
    pub caller: Dbref,
    pub depth: usize,
    /// Saved `%q` registers carried by the queue entry being executed.
    pub registers: Vec<String>,
}

impl Frame {
    #[must_use]
    pub fn new(executor: Dbref, enactor: Dbref) -> Self {
        Self {
            executor,
            enactor,
            caller: enactor,
            depth: 0,
            registers: Vec::new(),
        }
    }

    /// A frame one level deeper, for re-entrant evaluation.
    #[must_use]
    pub fn child(&self) -> Self {
        let mut f = self.clone();
        f.depth += 1;
        f
    }

    /// A frame for running `executor`'s own attribute text, triggered by
    /// this frame's enactor.
    #[must_use]
    pub fn for_executor(&self, executor: Dbref) -> Self {
        Self {
            executor,
            enactor: self.enactor,
            caller: self.executor,
            depth: self.depth + 1,
            registers: self.registers.clone(),
        }
    }
}

/// Evaluation recursion cap. Exceeding it surfaces inline, never panics.
pub const MAX_EVAL_DEPTH: usize = 30;

/// Inline softcode error form: `#-1 UPPERCASE DESCRIPTION`.
#[must_use]
pub fn softcode_error(desc: &str) -> String {
    format!("#-1 {}", desc.to_uppercase())
}

/// The black-box evaluation surface: `exec(text, args) → text`, reading the
/// world but never mutating it. Side effects happen by the evaluated text
/// being dispatched as commands, not inside evaluation.
pub trait Evaluator: Send + Sync {
    fn exec(&self, world: &World, frame: &Frame, text: &str, args: &[String]) -> String;
}

/// The built-in evaluator: `%`-substitution only. Function calls and
/// brackets pass through untouched.
pub struct SubstEvaluator;

impl Evaluator for SubstEvaluator {
    fn exec(&self, world: &World, frame: &Frame, text: &str, args: &[String]) -> String {
        if frame.depth > MAX_EVAL_DEPTH {
            return softcode_error("recursion");
        }
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                None => out.push('%'),
                Some('%') => out.push('%'),
                Some('b') | Some('B') => out.push(' '),
                Some('r') | Some('R') => out.push('\n'),
                Some('t') | Some('T') => out.push('\t'),
                Some('#') => out.push_str(&frame.enactor.to_string()),
                Some('!') => out.push_str(&frame.executor.to_string()),
                Some('n') | Some('N') => {
                    let name = world
                        .graph
                        .get(frame.enactor)
                        .map(|o| o.display_name().to_string())
                        .unwrap_or_default();
                    out.push_str(&name);
                }
                Some(d @ '0'..='9') => {
                    let idx = d as usize - '0' as usize;
                    if let Some(arg) = args.get(idx) {
                        out.push_str(arg);
                    }
                }
                Some('q') | Some('Q') => match chars.peek().copied() {
                    Some(d @ '0'..='9') => {
                        chars.next();
                        let idx = d as usize - '0' as usize;
                        if let Some(reg) = frame.registers.get(idx) {
                            out.push_str(reg);
                        }
                    }
                    _ => out.push_str("%q"),
                },
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;
    use marsh_common::NOTHING;

    #[test]
    fn test_substitutions() {
        let world = World::scratch();
        let player = world.graph.get(marsh_common::GOD).unwrap().dbref;
        let frame = Frame::new(player, player);
        let ev = SubstEvaluator;
        assert_eq!(
            ev.exec(&world, &frame, "Hello %0", &["World".to_string()]),
            "Hello World"
        );
        assert_eq!(ev.exec(&world, &frame, "%#", &[]), format!("{player}"));
        assert_eq!(ev.exec(&world, &frame, "%n waves.", &[]), "God waves.");
        assert_eq!(ev.exec(&world, &frame, "100%%", &[]), "100%");
        assert_eq!(ev.exec(&world, &frame, "a%bb", &[]), "a b");
    }

    #[test]
    fn test_missing_arg_is_empty() {
        let world = World::scratch();
        let frame = Frame::new(NOTHING, NOTHING);
        let ev = SubstEvaluator;
        assert_eq!(ev.exec(&world, &frame, "[%3]", &[]), "[]");
    }

    #[test]
    fn test_registers() {
        let world = World::scratch();
        let mut frame = Frame::new(NOTHING, NOTHING);
        frame.registers = vec!["alpha".to_string()];
        let ev = SubstEvaluator;
        assert_eq!(ev.exec(&world, &frame, "%q0/%q1", &[]), "alpha/");
    }

    #[test]
    fn test_depth_cap() {
        let world = World::scratch();
        let mut frame = Frame::new(NOTHING, NOTHING);
        frame.depth = MAX_EVAL_DEPTH + 1;
        let ev = SubstEvaluator;
        assert_eq!(ev.exec(&world, &frame, "anything", &[]), "#-1 RECURSION");
    }
}
