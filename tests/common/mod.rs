//! Recording execution context shared by the integration tests
//!
//! Every call is recorded. `capture` answers from a scripted table: the first
//! pattern found in the command, or in the content of any uploaded file the
//! command refers to, wins. Unmatched captures return an empty string.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use dbdeploy::{DbDeployError, ExecutionContext, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(String),
    Capture(String),
    Upload { path: String, content: String },
}

pub struct RecordingExecutor {
    release: String,
    calls: RefCell<Vec<Call>>,
    uploads: RefCell<BTreeMap<String, String>>,
    responses: Vec<(String, String)>,
    failures: Vec<String>,
    next_tmp: Cell<usize>,
}

impl RecordingExecutor {
    pub fn new(release: &str) -> Self {
        Self {
            release: release.to_string(),
            calls: RefCell::new(Vec::new()),
            uploads: RefCell::new(BTreeMap::new()),
            responses: Vec::new(),
            failures: Vec::new(),
            next_tmp: Cell::new(0),
        }
    }

    /// Answer captures matching `pattern` with `output`
    #[must_use]
    pub fn respond(mut self, pattern: &str, output: &str) -> Self {
        self.responses.push((pattern.to_string(), output.to_string()));
        self
    }

    /// Fail runs and captures matching `pattern`
    #[must_use]
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn captures(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Capture(command) if command != "mktemp" => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn runs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Run(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Upload { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    /// SQL fed to `sql-cli`, in execution order
    pub fn executed_sql(&self) -> Vec<String> {
        let uploads = self.uploads.borrow();
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Run(command) | Call::Capture(command) if command.contains("sql-cli") => {
                    uploads
                        .iter()
                        .find(|(path, _)| command.contains(&format!("'{path}'")))
                        .map(|(_, sql)| sql.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls, `mktemp` included
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn haystack(&self, command: &str) -> String {
        let mut haystack = command.to_string();
        for (path, content) in self.uploads.borrow().iter() {
            if command.contains(&format!("'{path}'")) {
                haystack.push('\n');
                haystack.push_str(content);
            }
        }
        haystack
    }

    fn check_failure(&self, command: &str) -> Result<()> {
        let haystack = self.haystack(command);
        match self.failures.iter().find(|pattern| haystack.contains(pattern.as_str())) {
            Some(pattern) => Err(DbDeployError::remote_execution(
                command,
                format!("ERROR: scripted failure on {pattern}"),
            )),
            None => Ok(()),
        }
    }
}

impl ExecutionContext for RecordingExecutor {
    fn run(&self, command: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Run(command.to_string()));
        self.check_failure(command)
    }

    fn capture(&self, command: &str) -> Result<String> {
        self.calls.borrow_mut().push(Call::Capture(command.to_string()));
        if command == "mktemp" {
            let n = self.next_tmp.get() + 1;
            self.next_tmp.set(n);
            return Ok(format!("/tmp/dbdeploy.{n}\n"));
        }
        self.check_failure(command)?;

        let haystack = self.haystack(command);
        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| haystack.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    fn upload(&self, content: &str, remote_path: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Upload {
            path: remote_path.to_string(),
            content: content.to_string(),
        });
        self.uploads.borrow_mut().insert(remote_path.to_string(), content.to_string());
        Ok(())
    }

    fn current_release_path(&self) -> &str {
        &self.release
    }
}
