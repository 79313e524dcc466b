use async_trait::async_trait;

use super::local::run_command;
use super::{Collector, CollectorResult};

/// Never prompt for a password or an unknown host key, and give up on hosts that do not answer
const SSH_OPTIONS: [&str; 3] = ["BatchMode=yes", "StrictHostKeyChecking=no", "ConnectTimeout=10"];

/// Runs a shell command on a remote host over SSH and collects its stdout.
#[derive(Debug, Clone)]
pub struct SshCollector {
    user: String,
    host: String,
    command: String,
}

impl SshCollector {
    pub fn new(user: impl Into<String>, host: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            command: command.into(),
        }
    }

    pub fn destination(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(SSH_OPTIONS.len() * 2 + 2);
        for option in SSH_OPTIONS {
            args.push("-o".to_string());
            args.push(option.to_string());
        }
        args.push(self.destination());
        args.push(self.command.clone());
        args
    }
}

#[async_trait]
impl Collector for SshCollector {
    fn name(&self) -> String {
        format!("ssh {} '{}'", self.destination(), self.command)
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        run_command("ssh", &self.args()).await
    }
}
