//! Command execution channel to the managed host.
//!
//! The library only needs to run a command and read back its exit code and
//! output. `LocalConnection` and `SshConnection` cover the common cases; test
//! suites plug in their own implementation.

use std::net::IpAddr;
use std::process::{Command, Output};

use tracing::debug;

use crate::error::{OwnerError, Result};
use crate::platform::OsName;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(return_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            return_code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn from_output(output: Output) -> Self {
        Self {
            // Killed by a signal: no code.
            return_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// Fail with `UnexpectedReturnCode` unless the code is in `expected`.
    pub fn check(self, command: &str, expected: &[i32]) -> Result<Self> {
        if expected.contains(&self.return_code) {
            Ok(self)
        } else {
            Err(OwnerError::UnexpectedReturnCode {
                command: command.to_string(),
                return_code: self.return_code,
                expected: expected.to_vec(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

pub trait Connection: Send + Sync {
    /// Run a shell command and return its result; the exit code is checked
    /// against `expected_return_codes`.
    fn execute_command(&self, command: &str, expected_return_codes: &[i32]) -> Result<CommandResult>;

    fn execute_powershell(&self, command: &str, expected_return_codes: &[i32])
        -> Result<CommandResult>;

    fn get_os_name(&self) -> Result<OsName>;

    /// Address the automation reaches the host on. Used for management
    /// interface detection.
    fn source_ip(&self) -> Option<IpAddr>;
}

/// Runs commands on the machine this process is running on.
#[derive(Debug, Clone, Default)]
pub struct LocalConnection {
    source_ip: Option<IpAddr>,
}

impl LocalConnection {
    pub fn new(source_ip: Option<IpAddr>) -> Self {
        Self { source_ip }
    }
}

impl Connection for LocalConnection {
    fn execute_command(&self, command: &str, expected_return_codes: &[i32]) -> Result<CommandResult> {
        debug!(command, "executing locally");
        let output = if cfg!(windows) {
            Command::new("cmd").args(["/C", command]).output()?
        } else {
            Command::new("sh").args(["-c", command]).output()?
        };
        CommandResult::from_output(output).check(command, expected_return_codes)
    }

    fn execute_powershell(
        &self,
        command: &str,
        expected_return_codes: &[i32],
    ) -> Result<CommandResult> {
        debug!(command, "executing local powershell");
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", command])
            .output()?;
        CommandResult::from_output(output).check(command, expected_return_codes)
    }

    fn get_os_name(&self) -> Result<OsName> {
        match std::env::consts::OS {
            "windows" => Ok(OsName::Windows),
            "macos" => Ok(OsName::MacOs),
            _ => {
                let result = self.execute_command("uname -s", &[0])?;
                result.stdout.parse()
            }
        }
    }

    fn source_ip(&self) -> Option<IpAddr> {
        self.source_ip
    }
}

/// Runs commands on a remote host through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshConnection {
    host: IpAddr,
    user: String,
}

impl SshConnection {
    pub fn new(host: IpAddr, user: impl Into<String>) -> Self {
        Self {
            host,
            user: user.into(),
        }
    }

    fn run(&self, remote_command: &str) -> Result<CommandResult> {
        let target = format!("{}@{}", self.user, self.host);
        debug!(target = %target, command = remote_command, "executing over ssh");
        let output = Command::new("ssh")
            .args([
                "-o",
                "ConnectTimeout=10",
                "-o",
                "BatchMode=yes",
                &target,
                remote_command,
            ])
            .output()?;
        let result = CommandResult::from_output(output);
        // 255 is ssh's own failure, not the remote command's.
        if result.return_code == 255 {
            return Err(OwnerError::Io(std::io::Error::other(format!(
                "ssh to {} failed: {}",
                target,
                result.stderr.trim()
            ))));
        }
        Ok(result)
    }
}

impl Connection for SshConnection {
    fn execute_command(&self, command: &str, expected_return_codes: &[i32]) -> Result<CommandResult> {
        self.run(command)?.check(command, expected_return_codes)
    }

    fn execute_powershell(
        &self,
        command: &str,
        expected_return_codes: &[i32],
    ) -> Result<CommandResult> {
        let wrapped = format!(
            "powershell -NoProfile -NonInteractive -Command \"{}\"",
            command.replace('"', "\\\"")
        );
        self.run(&wrapped)?.check(command, expected_return_codes)
    }

    fn get_os_name(&self) -> Result<OsName> {
        let uname = self.run("uname -s")?;
        if uname.return_code == 0 {
            return uname.stdout.parse();
        }
        // No uname: most likely a Windows OpenSSH server.
        let platform = self.execute_powershell("[System.Environment]::OSVersion.Platform", &[0])?;
        platform.stdout.parse()
    }

    fn source_ip(&self) -> Option<IpAddr> {
        Some(self.host)
    }
}
