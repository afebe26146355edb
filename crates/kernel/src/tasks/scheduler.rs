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

//! The game loop. One scheduler per server; it owns the world and the
//! queues outright. Each pass promotes due wait entries, executes a bounded
//! slice of the immediate queue, finalizes destroyed objects, sweeps idle
//! descriptors, then blocks up to one tick on the control channel that I/O
//! threads feed.

use crate::dispatch;
use crate::eval::Evaluator;
use crate::login::{self, LoginOutcome};
use crate::tasks::{Ctx, Queues};
use crate::world::World;
use flume::{Receiver, RecvTimeoutError, Sender};
use marsh_common::ObjFlag;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is not running")]
    NotRunning,
    #[error("Reply channel lost")]
    ReplyLost,
}

/// What I/O threads may ask of the game loop. Everything that touches the
/// graph goes through here, dark-connect flag writes included.
pub enum SchedulerMessage {
    /// Post-login input from a descriptor.
    SubmitInput { descriptor: Uuid, line: String },
    /// A login-phase line; the outcome is sent back to the transport.
    LoginLine {
        descriptor: Uuid,
        line: String,
        reply: Sender<LoginOutcome>,
    },
    /// The transport noticed the connection is gone.
    Disconnected { descriptor: Uuid },
    Shutdown,
}

/// Cloneable handle given to transports and admin surfaces.
#[derive(Clone)]
pub struct SchedulerClient {
    tx: Sender<SchedulerMessage>,
}

impl SchedulerClient {
    pub fn submit_input(&self, descriptor: Uuid, line: String) -> Result<(), SchedulerError> {
        self.tx
            .send(SchedulerMessage::SubmitInput { descriptor, line })
            .map_err(|_| SchedulerError::NotRunning)
    }

    /// Run a login-phase line on the game loop and wait for the outcome.
    pub async fn login_line(
        &self,
        descriptor: Uuid,
        line: String,
    ) -> Result<LoginOutcome, SchedulerError> {
        let (reply, rx) = flume::bounded(1);
        self.tx
            .send(SchedulerMessage::LoginLine {
                descriptor,
                line,
                reply,
            })
            .map_err(|_| SchedulerError::NotRunning)?;
        rx.recv_async().await.map_err(|_| SchedulerError::ReplyLost)
    }

    /// Blocking variant for synchronous callers (tests, consoles).
    pub fn login_line_blocking(
        &self,
        descriptor: Uuid,
        line: String,
    ) -> Result<LoginOutcome, SchedulerError> {
        let (reply, rx) = flume::bounded(1);
        self.tx
            .send(SchedulerMessage::LoginLine {
                descriptor,
                line,
                reply,
            })
            .map_err(|_| SchedulerError::NotRunning)?;
        rx.recv().map_err(|_| SchedulerError::ReplyLost)
    }

    pub fn disconnected(&self, descriptor: Uuid) -> Result<(), SchedulerError> {
        self.tx
            .send(SchedulerMessage::Disconnected { descriptor })
            .map_err(|_| SchedulerError::NotRunning)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SchedulerMessage::Shutdown);
    }
}

/// Responsible for the dispatching, control, and accounting of queued work.
/// There should be only one scheduler per server.
pub struct Scheduler {
    world: World,
    queues: Queues,
    evaluator: Arc<dyn Evaluator>,
    ctrl_rx: Receiver<SchedulerMessage>,
    kill_switch: Arc<AtomicBool>,
    last_idle_sweep: Instant,
}

impl Scheduler {
    pub fn new(
        world: World,
        evaluator: Arc<dyn Evaluator>,
        kill_switch: Arc<AtomicBool>,
    ) -> (Self, SchedulerClient) {
        let (tx, ctrl_rx) = flume::unbounded();
        let queues = Queues::new(world.config.max_queue_per_obj);
        (
            Self {
                world,
                queues,
                evaluator,
                ctrl_rx,
                kill_switch,
                last_idle_sweep: Instant::now(),
            },
            SchedulerClient { tx },
        )
    }

    /// Execute the scheduler loop. Runs on (and owns) the calling thread
    /// until shutdown.
    pub fn run(mut self) {
        info!("Starting scheduler loop");
        let tick = self.world.config.tick_interval();
        'outer: loop {
            if self.kill_switch.load(Ordering::SeqCst) {
                warn!("Scheduler stopping");
                break;
            }
            self.tick();
            match self.ctrl_rx.recv_timeout(tick) {
                Ok(msg) => {
                    if self.handle_message(msg) {
                        break 'outer;
                    }
                    // Drain whatever else arrived in this tick window.
                    while let Ok(msg) = self.ctrl_rx.try_recv() {
                        if self.handle_message(msg) {
                            break 'outer;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        if let Err(e) = self.world.persistence.close() {
            error!(?e, "Error closing persistence");
        }
        info!("Scheduler done.");
    }

    fn ctx(&mut self) -> Ctx<'_> {
        Ctx {
            world: &mut self.world,
            queues: &mut self.queues,
            evaluator: &*self.evaluator,
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        self.queues.promote_ready(now);

        for _ in 0..self.world.config.tasks_per_tick {
            let Some(entry) = self.queues.pop_immediate() else {
                break;
            };
            let mut ctx = Ctx {
                world: &mut self.world,
                queues: &mut self.queues,
                evaluator: &*self.evaluator,
            };
            dispatch::execute_entry(&mut ctx, &entry);
        }

        let collected = self.world.graph.collect_garbage();
        if !collected.is_empty() {
            debug!(count = collected.len(), "garbage collected");
            self.world.persist_objs(&collected);
            self.world.persist_meta();
        }

        if self.last_idle_sweep.elapsed() >= Duration::from_secs(1) {
            self.last_idle_sweep = Instant::now();
            let timeout = self.world.config.idle_timeout();
            for id in self.world.conns.idle_past(timeout) {
                info!(descriptor = ?id, "idle timeout, closing");
                if let Some(session) = self.world.conns.session_of(id) {
                    let _ = session.send_line("*** Inactivity timeout ***");
                    let _ = session.disconnect();
                }
            }
        }
    }

    /// Returns true on shutdown.
    fn handle_message(&mut self, msg: SchedulerMessage) -> bool {
        match msg {
            SchedulerMessage::Shutdown => {
                info!("Shutdown requested");
                self.kill_switch.store(true, Ordering::SeqCst);
                true
            }
            SchedulerMessage::SubmitInput { descriptor, line } => {
                self.on_input(descriptor, &line);
                false
            }
            SchedulerMessage::LoginLine {
                descriptor,
                line,
                reply,
            } => {
                let mut ctx = self.ctx();
                let outcome = login::handle_login_line(&mut ctx, descriptor, &line);
                let _ = reply.send(outcome);
                false
            }
            SchedulerMessage::Disconnected { descriptor } => {
                let mut ctx = self.ctx();
                login::handle_disconnect(&mut ctx, descriptor);
                false
            }
        }
    }

    fn on_input(&mut self, descriptor: Uuid, line: &str) {
        self.world.conns.touch(descriptor);
        let Some(player) = self.world.conns.player_of(descriptor) else {
            return;
        };
        let trimmed = line.trim();

        // First non-empty input clears the connect-time auto-dark.
        if !trimmed.is_empty()
            && self.world.conns.clear_auto_dark(descriptor)
            && let Some(p) = self.world.graph.get_mut(player)
        {
            p.flags.clear(ObjFlag::Dark);
            self.world.persist_obj(player);
        }

        let mut effective = trimmed;
        if let Some(capture) = self.world.conns.capture_of(player) {
            if trimmed == "@quitprogram" {
                // Falls through as a normal command, which clears capture.
            } else if let Some(rest) = trimmed.strip_prefix('|') {
                // Pipe prefix bypasses the capture for one command.
                effective = rest.trim_start();
            } else {
                // Capture fires: clears on all descriptors, runs the armed
                // attribute with the input as %0.
                self.world.conns.clear_capture(player);
                let text = self
                    .world
                    .graph
                    .attr_text(&self.world.registry, capture.obj, capture.attr)
                    .unwrap_or_default();
                if !text.is_empty() {
                    let entry = self.queues.make_entry(
                        capture.obj,
                        player,
                        capture.obj,
                        text,
                        vec![trimmed.to_string()],
                        capture.registers,
                        true,
                    );
                    self.queues.enqueue(entry);
                }
                return;
            }
        }

        if effective.is_empty() {
            return;
        }
        let entry = self.queues.make_entry(
            player,
            player,
            player,
            effective.to_string(),
            vec![],
            vec![],
            false,
        );
        self.queues.enqueue(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::SubstEvaluator;
    use crate::sessions::{MockSession, TransportKind};
    use crate::world::World;
    use marsh_common::{Dbref, NOTHING, ObjectKind};
    use std::sync::Arc;
    use std::thread;

    struct Server {
        client: SchedulerClient,
        kill: Arc<AtomicBool>,
        handle: thread::JoinHandle<()>,
        conns: Arc<crate::sessions::Connections>,
        bus: Arc<crate::bus::EventBus>,
    }

    fn start(world: World) -> Server {
        let kill = Arc::new(AtomicBool::new(false));
        let conns = world.conns.clone();
        let bus = world.bus.clone();
        let (scheduler, client) =
            Scheduler::new(world, Arc::new(SubstEvaluator), kill.clone());
        let handle = thread::spawn(move || scheduler.run());
        Server {
            client,
            kill,
            handle,
            conns,
            bus,
        }
    }

    fn stop(server: Server) {
        server.client.shutdown();
        server.handle.join().expect("scheduler thread");
        let _ = server.kill;
    }

    fn seeded_world() -> (World, Dbref) {
        let mut world = World::scratch();
        world.config.tick_ms = 5;
        let wizard = world
            .graph
            .create_object(ObjectKind::Player, "Wiz", NOTHING);
        {
            let w = world.graph.get_mut(wizard).unwrap();
            w.owner = wizard;
            w.flags.set(ObjFlag::Wizard);
        }
        world
            .graph
            .add_to_contents(wizard, Dbref::mk_id(0))
            .unwrap();
        world
            .graph
            .set_attr_raw(
                wizard,
                marsh_common::attr::A_PASS,
                login::hash_password("pw"),
                wizard,
                marsh_common::util::BitEnum::new(),
            )
            .unwrap();
        (world, wizard)
    }

    fn connect(server: &Server, name: &str, pw: &str) -> (Uuid, Arc<MockSession>, Dbref) {
        let session = MockSession::new();
        let id = server
            .conns
            .new_connection(TransportKind::StreamLine, "test", session.clone());
        server.bus.attach(id, session.clone());
        let outcome = server
            .client
            .login_line_blocking(id, format!("connect {name} {pw}"))
            .expect("login");
        let LoginOutcome::Connected(player) = outcome else {
            panic!("expected connection, got {outcome:?}");
        };
        (id, session, player)
    }

    fn wait_for<F: Fn() -> bool>(cond: F, ms: u64) -> bool {
        let deadline = Instant::now() + Duration::from_millis(ms);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_input_order_preserved_per_descriptor() {
        let (world, _wizard) = seeded_world();
        let server = start(world);
        let (id, session, _p) = connect(&server, "Wiz", "pw");
        session.clear();
        for i in 0..5 {
            server
                .client
                .submit_input(id, format!("think n{i}"))
                .unwrap();
        }
        assert!(wait_for(|| session.lines().len() >= 5, 2000));
        let thoughts: Vec<String> = session
            .lines()
            .into_iter()
            .filter(|l| l.starts_with('n'))
            .collect();
        assert_eq!(thoughts, vec!["n0", "n1", "n2", "n3", "n4"]);
        stop(server);
    }

    #[test]
    fn test_wait_defers_then_fires() {
        let (world, _wizard) = seeded_world();
        let server = start(world);
        let (id, session, _p) = connect(&server, "Wiz", "pw");
        session.clear();
        server
            .client
            .submit_input(id, "@wait 0.2=think delayed".to_string())
            .unwrap();
        // Immediately: nothing.
        thread::sleep(Duration::from_millis(50));
        assert!(!session.lines().contains(&"delayed".to_string()));
        // After the deadline: fired.
        assert!(wait_for(
            || session.lines().contains(&"delayed".to_string()),
            2000
        ));
        stop(server);
    }

    #[test]
    fn test_semaphore_wait_then_notify() {
        let (mut world, wizard) = seeded_world();
        let sem = world
            .graph
            .create_object(ObjectKind::Thing, "sem", wizard);
        world.graph.add_to_contents(sem, Dbref::mk_id(0)).unwrap();
        let server = start(world);
        let (id, session, _p) = connect(&server, "Wiz", "pw");
        session.clear();

        server
            .client
            .submit_input(id, "@wait sem/SEM=think woken".to_string())
            .unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(!session.lines().contains(&"woken".to_string()));

        server
            .client
            .submit_input(id, "@notify sem/SEM 1".to_string())
            .unwrap();
        assert!(wait_for(
            || session.lines().contains(&"woken".to_string()),
            2000
        ));
        stop(server);
    }

    #[test]
    fn test_program_capture_feeds_next_line() {
        let (mut world, wizard) = seeded_world();
        // The wizard programs themself for simplicity of the fixture; the
        // all-descriptor clearing is what matters.
        let askname = world.registry.resolve_or_define("ASKNAME");
        world
            .graph
            .set_attr_raw(
                wizard,
                askname,
                "@pemit %#=Hello %0",
                NOTHING,
                marsh_common::util::BitEnum::new(),
            )
            .unwrap();
        let server = start(world);
        let (id, session, _p) = connect(&server, "Wiz", "pw");
        let (id2, session2, _p2) = connect(&server, "Wiz", "pw");
        session.clear();
        session2.clear();

        server
            .client
            .submit_input(id, "@program Wiz=me/ASKNAME".to_string())
            .unwrap();
        assert!(wait_for(|| !session.lines().is_empty(), 2000));
        session.clear();
        session2.clear();

        // Input on the *other* descriptor fires the capture and clears it
        // everywhere.
        server
            .client
            .submit_input(id2, "World".to_string())
            .unwrap();
        assert!(wait_for(
            || session2.lines().contains(&"Hello World".to_string()),
            2000
        ));
        assert!(wait_for(|| server.conns.capture_of(_p2).is_none(), 500));

        // Subsequent input is ordinary again.
        session.clear();
        session2.clear();
        server
            .client
            .submit_input(id, "think plain".to_string())
            .unwrap();
        assert!(wait_for(
            || session.lines().contains(&"plain".to_string()),
            2000
        ));
        stop(server);
    }

    #[test]
    fn test_quitprogram_exits_capture() {
        let (mut world, wizard) = seeded_world();
        let askname = world.registry.resolve_or_define("ASKNAME");
        world
            .graph
            .set_attr_raw(
                wizard,
                askname,
                "@pemit %#=captured %0",
                NOTHING,
                marsh_common::util::BitEnum::new(),
            )
            .unwrap();
        let server = start(world);
        let (id, session, p) = connect(&server, "Wiz", "pw");
        session.clear();
        server
            .client
            .submit_input(id, "@program Wiz=me/ASKNAME".to_string())
            .unwrap();
        assert!(wait_for(|| server.conns.capture_of(p).is_some(), 2000));
        server
            .client
            .submit_input(id, "@quitprogram".to_string())
            .unwrap();
        assert!(wait_for(|| server.conns.capture_of(p).is_none(), 2000));
        assert!(wait_for(
            || session.lines().contains(&"Aborted.".to_string()),
            2000
        ));
        stop(server);
    }

    #[test]
    fn test_pipe_bypasses_capture() {
        let (mut world, wizard) = seeded_world();
        let askname = world.registry.resolve_or_define("ASKNAME");
        world
            .graph
            .set_attr_raw(
                wizard,
                askname,
                "@pemit %#=captured %0",
                NOTHING,
                marsh_common::util::BitEnum::new(),
            )
            .unwrap();
        let server = start(world);
        let (id, session, p) = connect(&server, "Wiz", "pw");
        session.clear();
        server
            .client
            .submit_input(id, "@program Wiz=me/ASKNAME".to_string())
            .unwrap();
        assert!(wait_for(|| server.conns.capture_of(p).is_some(), 2000));
        session.clear();

        server
            .client
            .submit_input(id, "|think piped".to_string())
            .unwrap();
        assert!(wait_for(
            || session.lines().contains(&"piped".to_string()),
            2000
        ));
        // Capture is still armed.
        assert!(server.conns.capture_of(p).is_some());
        stop(server);
    }

    #[test]
    fn test_destroy_collects_on_tick() {
        let (mut world, wizard) = seeded_world();
        let junk = world
            .graph
            .create_object(ObjectKind::Thing, "junk", wizard);
        world.graph.add_to_contents(junk, Dbref::mk_id(0)).unwrap();
        let server = start(world);
        let (id, session, _p) = connect(&server, "Wiz", "pw");
        session.clear();
        server
            .client
            .submit_input(id, "@destroy junk".to_string())
            .unwrap();
        assert!(wait_for(
            || session.lines().contains(&"Destroyed.".to_string()),
            2000
        ));
        // The tick finalizes Going into Garbage; the name is gone.
        server
            .client
            .submit_input(id, "look junk".to_string())
            .unwrap();
        assert!(wait_for(
            || session
                .lines()
                .contains(&"I don't see that here.".to_string()),
            2000
        ));
        stop(server);
    }
}
