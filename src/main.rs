// Copyright (C) 2026 the etamoo authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use etamoo::config::Config;
use etamoo::db::WorldStateDb;
use etamoo::tasks::sessions::{Session, SessionError};
use etamoo::tasks::Scheduler;
use etamoo::var::Objid;

#[derive(Parser, Debug)]
#[command(author, version, about = "A LambdaMOO-family server core")]
struct Args {
    /// The database file. Parsed by the external textdump loader; a missing
    /// file bootstraps a minimal core.
    db_file: PathBuf,

    /// TCP listen port for the external network host.
    #[arg(long, default_value = "7777")]
    port: u16,

    /// Seconds between checkpoint requests.
    #[arg(long)]
    checkpoint_interval: Option<u64>,

    /// Log file; defaults to stderr.
    #[arg(long)]
    log: Option<PathBuf>,
}

/// Console session: output lines go straight to stdout.
struct ConsoleSession {}

impl Session for ConsoleSession {
    fn send_text(&self, _player: Objid, msg: &str) {
        println!("{}", msg);
        let _ = std::io::stdout().flush();
    }

    fn connected_players(&self) -> Vec<Objid> {
        vec![Objid(1)]
    }
    fn connection_name(&self, player: Objid) -> Result<String, SessionError> {
        Ok(format!("console connection for {}", player))
    }
    fn connected_seconds(&self, _player: Objid) -> Result<i64, SessionError> {
        Ok(0)
    }
    fn idle_seconds(&self, _player: Objid) -> Result<i64, SessionError> {
        Ok(0)
    }
    fn boot_player(&self, _player: Objid) -> Result<(), SessionError> {
        Err(SessionError::NotSupported)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match &args.log {
        Some(path) => {
            let Ok(file) = std::fs::File::create(path) else {
                eprintln!("cannot open log file {}", path.display());
                return ExitCode::from(2);
            };
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    // The on-disk format belongs to the external loader collaborator. An
    // existing file we cannot hand off is a load failure; a missing file
    // gets the bootstrap core.
    let db = if args.db_file.exists() {
        error!(
            "no textdump loader is linked into this build; cannot load {}",
            args.db_file.display()
        );
        return ExitCode::from(1);
    } else {
        info!(
            "database {} not found; bootstrapping a minimal core",
            args.db_file.display()
        );
        WorldStateDb::with_minimal_core()
    };

    let config = Config {
        port: args.port,
        checkpoint_interval_seconds: args.checkpoint_interval,
        ..Config::default()
    };

    let mut scheduler = Scheduler::new(Arc::new(db), config);
    let handle = scheduler.handle();
    let client = scheduler.client();

    if let Some(interval) = args.checkpoint_interval {
        let client = client.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(interval));
            client.checkpoint();
        });
    }

    let scheduler_thread = std::thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || scheduler.run())
        .expect("could not start scheduler");

    // The console: a wizard connection on stdin until EOF or shutdown.
    // Network hosts attach through the same scheduler handle.
    let session: Arc<dyn Session> = Arc::new(ConsoleSession {});
    let wizard = Objid(1);
    info!("console ready; port {} reserved for the network host", args.port);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        handle.submit_command(wizard, &line, session.clone());
    }

    handle.shutdown(Some("console closed".to_string()));
    if scheduler_thread.join().is_err() {
        error!("scheduler thread panicked");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
