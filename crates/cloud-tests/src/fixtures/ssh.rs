//! Remote command execution through the system `ssh` binary.
//!
//! Instances reach `ACTIVE` before sshd answers, so connection failures
//! (exit status 255) are retried until the connect policy runs out. Any other
//! non-zero exit is the remote command's failure and is returned at once.

use crate::adapters::{RemoteExec, RemoteExecFactory, RemoteTarget};
use crate::eventual::{poll_until_some, PollPolicy};
use async_trait::async_trait;
use common::error::{CloudError, Result};
use common::secret::ExposeSecret;
use std::io::Write;
use std::process::Output;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Exit status `ssh` uses for its own (connection) errors.
const SSH_CONNECTION_ERROR: i32 = 255;

/// Per-attempt TCP connect timeout passed to `ssh`, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Opens [`SshExecutor`] sessions.
#[derive(Debug, Clone, Copy)]
pub struct SshExecutorFactory {
    connect_policy: PollPolicy,
}

impl SshExecutorFactory {
    #[must_use]
    pub fn new(connect_policy: PollPolicy) -> Self {
        Self { connect_policy }
    }
}

impl RemoteExecFactory for SshExecutorFactory {
    fn connect(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteExec>> {
        Ok(Box::new(SshExecutor::new(target, self.connect_policy)?))
    }
}

/// One `ssh` target. Each command runs in its own `ssh` invocation.
#[derive(Debug)]
pub struct SshExecutor {
    destination: String,
    // Removed from disk when the executor drops.
    key_file: Option<NamedTempFile>,
    connect_policy: PollPolicy,
}

impl SshExecutor {
    pub fn new(target: &RemoteTarget, connect_policy: PollPolicy) -> Result<Self> {
        let key_file = match &target.private_key {
            Some(key) => {
                let mut file = NamedTempFile::new()?;
                file.write_all(key.expose_secret().as_bytes())?;
                file.flush()?;
                Some(file)
            }
            None => None,
        };

        Ok(Self {
            destination: format!("{}@{}", target.username, target.address),
            key_file,
            connect_policy,
        })
    }

    fn command(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "BatchMode=yes"])
            .args(["-o", "LogLevel=ERROR"])
            .arg("-o")
            .arg(format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"));
        if let Some(key_file) = &self.key_file {
            cmd.arg("-i").arg(key_file.path());
        }
        cmd.arg(&self.destination).arg(remote_command);
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run_once(&self, remote_command: &str) -> Result<Option<Output>> {
        let output = self.command(remote_command).output().await?;
        match output.status.code() {
            Some(SSH_CONNECTION_ERROR) => {
                debug!(
                    target: "cloudcheck.ssh",
                    destination = %self.destination,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "ssh connection failed, retrying"
                );
                Ok(None)
            }
            _ => Ok(Some(output)),
        }
    }
}

#[async_trait]
impl RemoteExec for SshExecutor {
    #[instrument(skip(self), fields(destination = %self.destination))]
    async fn exec_command(&self, command: &str) -> Result<String> {
        let output = poll_until_some(
            || self.run_once(command),
            self.connect_policy.timeout,
            self.connect_policy.interval,
        )
        .await?
        .ok_or_else(|| CloudError::Timeout {
            condition: format!("ssh connection to {}", self.destination),
            waited: self.connect_policy.timeout,
        })?;

        if !output.status.success() {
            return Err(CloudError::RemoteCommandFailed {
                command: command.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::SecretString;
    use std::time::Duration;

    fn policy() -> PollPolicy {
        PollPolicy::new(Duration::from_secs(1), Duration::from_millis(100))
    }

    #[test]
    fn test_key_file_written_and_passed() {
        let target = RemoteTarget {
            address: "10.0.0.5".to_string(),
            username: "cirros".to_string(),
            private_key: Some(SecretString::from("-----BEGIN KEY-----\nabc\n")),
        };
        let executor = SshExecutor::new(&target, policy()).unwrap();

        let key_path = executor.key_file.as_ref().unwrap().path().to_path_buf();
        let contents = std::fs::read_to_string(&key_path).unwrap();
        assert_eq!(contents, "-----BEGIN KEY-----\nabc\n");

        let cmd = executor.command("true");
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&key_path.to_string_lossy().into_owned()));
        assert_eq!(args[args.len() - 2], "cirros@10.0.0.5");
        assert_eq!(args[args.len() - 1], "true");
    }

    #[test]
    fn test_key_file_removed_on_drop() {
        let target = RemoteTarget {
            address: "10.0.0.5".to_string(),
            username: "cirros".to_string(),
            private_key: Some(SecretString::from("key")),
        };
        let executor = SshExecutor::new(&target, policy()).unwrap();
        let key_path = executor.key_file.as_ref().unwrap().path().to_path_buf();
        drop(executor);
        assert!(!key_path.exists());
    }

    #[test]
    fn test_no_identity_flag_without_key() {
        let target = RemoteTarget {
            address: "10.0.0.5".to_string(),
            username: "ubuntu".to_string(),
            private_key: None,
        };
        let executor = SshExecutor::new(&target, policy()).unwrap();
        let cmd = executor.command("uptime");
        assert!(!cmd.as_std().get_args().any(|a| a == "-i"));
    }
}
