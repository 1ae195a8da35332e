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

use std::sync::Arc;

use etamoo::config::Config;
use etamoo::db::WorldStateDb;
use etamoo::model::r#match::{ArgSpec, PrepSpec, VerbArgsSpec};
use etamoo::model::VerbFlag;
use etamoo::tasks::sessions::BufferingSession;
use etamoo::tasks::Scheduler;
use etamoo::util::BitEnum;
use etamoo::var::{Objid, Symbol};

pub const WIZARD: Objid = Objid(1);
pub const ROOM: Objid = Objid(2);

/// A test world: the bootstrap core plus a scheduler wired to it.
pub struct TestWorld {
    pub db: WorldStateDb,
    pub scheduler: Scheduler,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let db = WorldStateDb::with_minimal_core();
        let scheduler = Scheduler::new(Arc::new(db.clone()), config);
        Self { db, scheduler }
    }

    /// Install a verb via the loader seam, the way the external textdump
    /// loader would.
    pub fn add_verb(&self, obj: Objid, names: &[&str], args: VerbArgsSpec, source: &str) {
        let mut loader = self.db.loader();
        loader
            .add_verb(
                obj,
                names.iter().map(|n| Symbol::mk(n)).collect(),
                WIZARD,
                VerbFlag::rxd(),
                args,
                source.to_string(),
            )
            .expect("add test verb");
        loader.commit().expect("commit test verb");
    }

    /// Like `add_verb` but without the debug bit, for error-value testing.
    pub fn add_verb_no_debug(&self, obj: Objid, names: &[&str], source: &str) {
        let mut loader = self.db.loader();
        loader
            .add_verb(
                obj,
                names.iter().map(|n| Symbol::mk(n)).collect(),
                WIZARD,
                BitEnum::new_with(VerbFlag::Read) | VerbFlag::Exec,
                VerbArgsSpec::this_none_this(),
                source.to_string(),
            )
            .expect("add test verb");
        loader.commit().expect("commit test verb");
    }

    /// Evaluate an expression/program as the wizard and return everything
    /// the task printed, the `=> result` line included.
    pub fn eval(&mut self, code: &str) -> Vec<String> {
        let session = Arc::new(BufferingSession::new());
        self.scheduler
            .submit_eval_task(WIZARD, code, session.clone());
        self.scheduler.run_until_quiescent();
        session.drain().into_iter().map(|(_, line)| line).collect()
    }

    /// Evaluate and return just the `=>` result line.
    pub fn eval_result(&mut self, code: &str) -> String {
        let output = self.eval(code);
        output
            .iter()
            .rev()
            .find(|line| line.starts_with("=> "))
            .cloned()
            .unwrap_or_else(|| panic!("no result line in output: {:?}", output))
    }

    /// Run a command line as the wizard.
    pub fn command(&mut self, line: &str) -> Vec<String> {
        let session = Arc::new(BufferingSession::new());
        self.scheduler
            .submit_command_task(WIZARD, line, session.clone());
        self.scheduler.run_until_quiescent();
        session.drain().into_iter().map(|(_, line)| line).collect()
    }
}

pub fn this_none_this() -> VerbArgsSpec {
    VerbArgsSpec::this_none_this()
}

pub fn none_none_none() -> VerbArgsSpec {
    VerbArgsSpec {
        dobj: ArgSpec::None,
        prep: PrepSpec::None,
        iobj: ArgSpec::None,
    }
}
