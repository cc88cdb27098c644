//! In-memory remote execution.
//!
//! Understands the handful of commands the scenarios issue:
//!
//! - `true` succeeds with no output
//! - `date > <file>; sync` writes a deterministic, increasing timestamp
//! - `cat <file>` prints the file, or fails with status 1 if it is missing
//! - `curl <url>` answers from a scripted queue; once the queue is drained
//!   the target address itself is returned, or nothing if the metadata
//!   service is marked unavailable
//!
//! Files are kept per target address, so a reconnect to the same address
//! sees the same disk unless [`MockRemoteExecFactory::with_ephemeral_disk`]
//! wipes it on every new connection.

use crate::call_log::CallLog;
use async_trait::async_trait;
use cloud_tests::adapters::{RemoteExec, RemoteExecFactory, RemoteTarget};
use common::error::{CloudError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct GuestState {
    files: HashMap<String, HashMap<String, String>>,
    metadata_responses: VecDeque<String>,
    metadata_unavailable: bool,
    clock: u32,
    ephemeral_disk: bool,
    refuse_connections: bool,
    connections: Vec<RemoteTarget>,
}

/// Factory handing out [`MockRemoteExec`] sessions over shared guest state.
#[derive(Debug, Clone, Default)]
pub struct MockRemoteExecFactory {
    state: Arc<Mutex<GuestState>>,
    log: CallLog,
}

impl MockRemoteExecFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Queue answers for `curl` commands, served in order.
    #[must_use]
    pub fn with_metadata_responses(self, responses: &[&str]) -> Self {
        self.state.lock().unwrap().metadata_responses =
            responses.iter().map(|r| (*r).to_string()).collect();
        self
    }

    /// Answer every `curl` with empty output once the queue is drained.
    #[must_use]
    pub fn with_metadata_unavailable(self) -> Self {
        self.state.lock().unwrap().metadata_unavailable = true;
        self
    }

    /// Wipe the guest disk whenever a new session is opened, as if the
    /// instance came back from the original image.
    #[must_use]
    pub fn with_ephemeral_disk(self) -> Self {
        self.state.lock().unwrap().ephemeral_disk = true;
        self
    }

    /// Fail every `connect` call.
    #[must_use]
    pub fn refusing_connections(self) -> Self {
        self.state.lock().unwrap().refuse_connections = true;
        self
    }

    /// Overwrite a file on the guest at `address`.
    pub fn write_file(&self, address: &str, path: &str, contents: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .entry(address.to_string())
            .or_default()
            .insert(path.to_string(), contents.to_string());
    }

    pub fn read_file(&self, address: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.files.get(address).and_then(|f| f.get(path)).cloned()
    }

    /// Targets connected to, in order.
    pub fn connections(&self) -> Vec<RemoteTarget> {
        self.state.lock().unwrap().connections.clone()
    }

    /// Commands run against `address`, in order.
    pub fn commands_for(&self, address: &str) -> Vec<String> {
        let prefix = format!("exec:{address}:");
        self.log
            .entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Total `curl` invocations across all guests.
    pub fn metadata_queries(&self) -> usize {
        self.log
            .entries_for("exec")
            .iter()
            .filter(|e| e.contains(":curl "))
            .count()
    }
}

impl RemoteExecFactory for MockRemoteExecFactory {
    fn connect(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteExec>> {
        self.log.record(format!("connect:{}", target.address));
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err(CloudError::Timeout {
                condition: format!("ssh connection to {}", target.address),
                waited: std::time::Duration::ZERO,
            });
        }
        if state.ephemeral_disk {
            state.files.remove(&target.address);
        }
        state.connections.push(target.clone());

        Ok(Box::new(MockRemoteExec {
            address: target.address.clone(),
            state: self.state.clone(),
            log: self.log.clone(),
        }))
    }
}

/// One session against a mock guest.
#[derive(Debug)]
pub struct MockRemoteExec {
    address: String,
    state: Arc<Mutex<GuestState>>,
    log: CallLog,
}

impl MockRemoteExec {
    fn run(&self, command: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();

        if command == "true" {
            return Ok(String::new());
        }

        if let Some(rest) = command.strip_prefix("date > ") {
            let path = rest.split(';').next().unwrap_or(rest).trim().to_string();
            state.clock += 1;
            let timestamp = format!("Thu Oct 15 12:00:{:02} UTC 2026\n", state.clock);
            state
                .files
                .entry(self.address.clone())
                .or_default()
                .insert(path, timestamp);
            return Ok(String::new());
        }

        if let Some(path) = command.strip_prefix("cat ") {
            let path = path.trim();
            return state
                .files
                .get(&self.address)
                .and_then(|files| files.get(path))
                .cloned()
                .ok_or_else(|| CloudError::RemoteCommandFailed {
                    command: command.to_string(),
                    status: 1,
                    stderr: format!("cat: can't open '{path}': No such file or directory"),
                });
        }

        if command.starts_with("curl ") {
            if let Some(response) = state.metadata_responses.pop_front() {
                return Ok(response);
            }
            if state.metadata_unavailable {
                return Ok(String::new());
            }
            return Ok(self.address.clone());
        }

        Ok(String::new())
    }
}

#[async_trait]
impl RemoteExec for MockRemoteExec {
    async fn exec_command(&self, command: &str) -> Result<String> {
        self.log.record(format!("exec:{}:{command}", self.address));
        self.run(command)
    }
}
