use crate::hosts::{resolve_host, LOCAL_HOST};
use std::{
    collections::BTreeMap,
    io,
    process::{Command, ExitStatus},
    time::Duration,
};
use tracing::{debug, info};
use tracing_unwrap::ResultExt;
use wait_timeout::ChildExt;

/// cached remote-execution channel for one host
///
/// commands for the `local` pseudo host run directly on this machine, all
/// others are wrapped in an ssh invocation addressed at the literal host name
#[derive(Debug, Clone)]
pub struct RemoteShell {
    host: String,
    is_local: bool,
}

impl RemoteShell {
    fn connect(host: &str) -> Self {
        let is_local = host == LOCAL_HOST;
        let host = resolve_host(host).to_string();
        info!(host = %host, is_local, "opening shell channel");

        Self { host, is_local }
    }

    fn wrap(&self, command: &str) -> String {
        if self.is_local {
            command.to_string()
        } else {
            // single quotes keep redirections on the remote side
            format!("ssh {} '{}'", self.host, command)
        }
    }

    /// fire a command on the target as a backgrounded invocation
    ///
    /// the returned status is that of the invocation itself, the job's own
    /// exit code is never observed through this channel
    pub fn launch(&self, command: &str) -> io::Result<ExitStatus> {
        let line = format!("{} &", self.wrap(command));
        debug!(line = %line, "issuing backgrounded invocation");

        Command::new("sh").arg("-c").arg(line).status()
    }

    /// run a short command on the target and wait for it, bounded by `timeout`
    pub fn run(&self, command: &str, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let mut child = Command::new("sh").arg("-c").arg(self.wrap(command)).spawn()?;

        match child.wait_timeout(timeout)? {
            Some(status) => Ok(Some(status)),
            None => {
                // the invocation itself hung, reap it and report the timeout
                child.kill().unwrap_or_log();
                child.wait().unwrap_or_log();

                Ok(None)
            }
        }
    }
}

/// host -> channel pool owned by the supervisor, populated lazily
#[derive(Debug, Default)]
pub struct ShellPool {
    shells: BTreeMap<String, RemoteShell>,
}

impl ShellPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// reuse the channel for `host` or open it on first use
    pub fn get_or_connect(&mut self, host: &str) -> &RemoteShell {
        self.shells
            .entry(host.to_string())
            .or_insert_with(|| RemoteShell::connect(host))
    }
}
