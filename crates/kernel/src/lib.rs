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

//! The game runtime. Everything here runs on (or is marshalled onto) the
//! single game-loop thread that owns the world graph; I/O threads talk to it
//! through the [`tasks::SchedulerClient`] handle and the connection
//! registry, both of which are thread-safe.

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod eval;
pub mod locks;
pub mod login;
pub mod look;
pub mod matching;
pub mod movement;
pub mod perms;
pub mod sessions;
pub mod tasks;
pub mod triggers;
pub mod world;

pub use config::Config;
pub use eval::{Evaluator, Frame, SubstEvaluator};
pub use world::World;
