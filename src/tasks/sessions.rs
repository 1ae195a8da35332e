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

use thiserror::Error as ThisError;

use crate::var::{Objid, Var};

/// Errors surfaced from the connection layer; mapped to MOO errors by the
/// builtins that hit them.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("no connection for player {0}")]
    NoConnection(Objid),
    #[error("operation not supported by this host")]
    NotSupported,
}

/// The seam to the network host. The core never touches sockets; it asks
/// the session to deliver text and answers connection queries through it.
/// Output is expected to be buffered per-task and flushed on commit,
/// discarded on rollback, by hosts that care about transactional output.
pub trait Session: Send + Sync {
    fn send_text(&self, player: Objid, msg: &str);

    fn connected_players(&self) -> Vec<Objid>;
    fn connection_name(&self, player: Objid) -> Result<String, SessionError>;
    fn connected_seconds(&self, player: Objid) -> Result<i64, SessionError>;
    fn idle_seconds(&self, player: Objid) -> Result<i64, SessionError>;
    fn boot_player(&self, player: Objid) -> Result<(), SessionError>;

    fn connection_option(&self, _player: Objid, _option: &str) -> Result<Var, SessionError> {
        Err(SessionError::NotSupported)
    }
    fn set_connection_option(
        &self,
        _player: Objid,
        _option: &str,
        _value: &Var,
    ) -> Result<(), SessionError> {
        Err(SessionError::NotSupported)
    }

    /// Listener management, for hosts that run network listeners.
    fn listen(&self, _object: Objid, _point: u16, _print_messages: bool) -> Result<(), SessionError> {
        Err(SessionError::NotSupported)
    }
    fn unlisten(&self, _point: u16) -> Result<(), SessionError> {
        Err(SessionError::NotSupported)
    }
    fn listeners(&self) -> Vec<(Objid, u16, bool)> {
        vec![]
    }
    fn open_network_connection(&self, _host: &str, _port: u16) -> Result<Objid, SessionError> {
        Err(SessionError::NotSupported)
    }
}

/// A session that drops output; used for forked/background tasks with no
/// attached connection and in tests that don't inspect output.
pub struct NoopSession {}

impl Session for NoopSession {
    fn send_text(&self, _player: Objid, _msg: &str) {}

    fn connected_players(&self) -> Vec<Objid> {
        vec![]
    }
    fn connection_name(&self, player: Objid) -> Result<String, SessionError> {
        Err(SessionError::NoConnection(player))
    }
    fn connected_seconds(&self, player: Objid) -> Result<i64, SessionError> {
        Err(SessionError::NoConnection(player))
    }
    fn idle_seconds(&self, player: Objid) -> Result<i64, SessionError> {
        Err(SessionError::NoConnection(player))
    }
    fn boot_player(&self, player: Objid) -> Result<(), SessionError> {
        Err(SessionError::NoConnection(player))
    }
}

/// A session that accumulates output in memory, for tests and the console.
pub struct BufferingSession {
    output: std::sync::Mutex<Vec<(Objid, String)>>,
}

impl BufferingSession {
    pub fn new() -> Self {
        Self {
            output: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn drain(&self) -> Vec<(Objid, String)> {
        std::mem::take(&mut self.output.lock().unwrap())
    }
}

impl Default for BufferingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for BufferingSession {
    fn send_text(&self, player: Objid, msg: &str) {
        self.output.lock().unwrap().push((player, msg.to_string()));
    }

    fn connected_players(&self) -> Vec<Objid> {
        vec![]
    }
    fn connection_name(&self, player: Objid) -> Result<String, SessionError> {
        Ok(format!("test connection for {}", player))
    }
    fn connected_seconds(&self, _player: Objid) -> Result<i64, SessionError> {
        Ok(0)
    }
    fn idle_seconds(&self, _player: Objid) -> Result<i64, SessionError> {
        Ok(0)
    }
    fn boot_player(&self, _player: Objid) -> Result<(), SessionError> {
        Ok(())
    }
}
