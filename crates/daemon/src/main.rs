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

//! The marsh server daemon. Initialization runs in dependency order:
//! persistence, then bus and connection registry, then the world, then the
//! scheduler, then listeners. Teardown walks the same list backwards.

mod args;
mod telnet;

use args::Args;
use clap::Parser;
use eyre::bail;
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Yaml};
use marsh_db::fjall_persistence::FjallPersistence;
use marsh_db::{NullPersistence, WorldPersistence};
use marsh_kernel::bus::EventBus;
use marsh_kernel::sessions::Connections;
use marsh_kernel::tasks::Scheduler;
use marsh_kernel::{Config, SubstEvaluator, World};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let args: Args = Args::parse();

    let main_subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(main_subscriber)
        .expect("Unable to set configure logging");

    let config = load_config(&args)?;

    // A server with nothing to listen on is a mistake, not a mode.
    let Some(listen) = config.telnet_listen.clone() else {
        bail!("No listener configured; refusing to start");
    };
    let telnet_sockaddr = listen
        .parse::<SocketAddr>()
        .map_err(|e| eyre::eyre!("Bad listen address {listen}: {e}"))?;

    let persistence: Arc<dyn WorldPersistence> = match &config.database_path {
        Some(path) => Arc::new(FjallPersistence::open(Some(path))?),
        None => {
            info!("No database path configured, running an in-memory world");
            Arc::new(NullPersistence)
        }
    };
    let bus = Arc::new(EventBus::new());
    let conns = Arc::new(Connections::new());
    let world = World::boot(config, persistence, bus.clone(), conns.clone())?;

    let kill_switch = Arc::new(AtomicBool::new(false));
    let (scheduler, client) =
        Scheduler::new(world, Arc::new(SubstEvaluator), kill_switch.clone());
    let scheduler_thread = std::thread::Builder::new()
        .name("marsh-scheduler".to_string())
        .spawn(move || scheduler.run())
        .expect("Unable to spawn scheduler thread");

    let mut hup_signal =
        signal(SignalKind::hangup()).expect("Unable to register HUP signal handler");
    let mut stop_signal =
        signal(SignalKind::interrupt()).expect("Unable to register STOP signal handler");

    let listener_loop = telnet::run_listener(
        telnet_sockaddr,
        conns.clone(),
        bus.clone(),
        client.clone(),
        kill_switch.clone(),
    );

    select! {
        result = listener_loop => {
            info!("Listener loop exited.");
            result?;
        },
        _ = hup_signal.recv() => {
            info!("HUP received, stopping...");
            kill_switch.store(true, Ordering::SeqCst);
        },
        _ = stop_signal.recv() => {
            info!("STOP received, stopping...");
            kill_switch.store(true, Ordering::SeqCst);
        }
    }

    // Reverse order: accept loop is already draining via the kill switch;
    // stop the game loop (which closes persistence on its way out).
    client.shutdown();
    tokio::task::spawn_blocking(move || {
        scheduler_thread.join().expect("scheduler thread panicked");
    })
    .await?;
    info!("Done.");

    Ok(())
}

/// Defaults, under the config file (yaml or json by extension), under CLI
/// flags. Later wins.
fn load_config(args: &Args) -> Result<Config, eyre::Error> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = &args.config_file {
        figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Yaml::file(path)),
        };
    }
    let mut config: Config = figment.extract()?;

    if let Some(address) = &args.telnet_address {
        let port = args.telnet_port.unwrap_or(4201);
        config.telnet_listen = Some(format!("{address}:{port}"));
    } else if let Some(port) = args.telnet_port {
        let address = config
            .telnet_listen
            .as_deref()
            .and_then(|l| l.rsplit_once(':').map(|(a, _)| a.to_string()))
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.telnet_listen = Some(format!("{address}:{port}"));
    }
    if let Some(path) = &args.world_db {
        config.database_path = Some(path.clone());
    }
    if let Some(secs) = args.idle_timeout {
        config.idle_timeout_secs = secs;
    }
    Ok(config)
}
