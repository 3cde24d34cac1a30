//! Git operations for the backup working copy.
//!
//! This module provides a trait-based abstraction over git commands
//! to enable easy mocking in tests.

use std::fmt;
use std::path::Path;
use std::process::{Command, Output};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use miette::Diagnostic;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Errors that can occur during git operations.
#[derive(Error, Diagnostic, Debug)]
pub enum GitError {
    #[error("Git command failed: {0}")]
    #[diagnostic(code(grafana_backup::sync::git::command_failed))]
    CommandFailed(String),

    #[error("Git command returned non-zero exit code {code}: {output}")]
    #[diagnostic(code(grafana_backup::sync::git::non_zero_exit))]
    NonZeroExit { code: i32, output: String },

    #[error("Git not installed or not in PATH")]
    #[diagnostic(code(grafana_backup::sync::git::not_found))]
    GitNotFound,
}

/// Identity recorded as both author and committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// HTTP basic-auth credentials for the remote.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for git's `http.extraHeader`.
    pub fn auth_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Authorization: Basic {}", token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Trait for git operations. Can be mocked in tests.
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Clone `url` into the existing, empty directory `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<Output, GitError>;

    /// Get repository status in porcelain format.
    fn status_porcelain(&self, path: &Path) -> Result<Output, GitError>;

    /// Add files to the staging area.
    fn add_files(&self, path: &Path, files: &[String]) -> Result<Output, GitError>;

    /// Create a commit with the given message, authored now.
    fn commit(&self, path: &Path, message: &str, author: &Author) -> Result<Output, GitError>;

    /// Push to a remote repository.
    fn push(&self, path: &Path, remote: &str, refspec: &str) -> Result<Output, GitError>;
}

/// Real implementation of GitOps using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct RealGit {
    credentials: Option<Credentials>,
    branch: Option<String>,
}

impl RealGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticate clone and push with basic auth.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Clone this branch instead of the remote HEAD.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Base command for `args` in `path`. Credentials travel through git's
    /// environment config, never through argv or `.git/config`.
    pub(crate) fn command(&self, path: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(path)
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(credentials) = &self.credentials {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", credentials.auth_header());
        }
        cmd
    }

    /// Helper to run a prepared git command and return the output.
    fn run(&self, mut cmd: Command) -> Result<Output, GitError> {
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::GitNotFound
            } else {
                GitError::CommandFailed(e.to_string())
            }
        })?;
        self.check_output(output)
    }

    /// Check if the output indicates success, otherwise return an error.
    fn check_output(&self, output: Output) -> Result<Output, GitError> {
        if output.status.success() {
            Ok(output)
        } else {
            let code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            // Combine stdout and stderr for error message
            let combined = if !stdout.is_empty() && !stderr.is_empty() {
                format!("{}\n{}", stdout, stderr)
            } else if !stdout.is_empty() {
                stdout
            } else {
                stderr
            };
            Err(GitError::NonZeroExit {
                code,
                output: combined,
            })
        }
    }
}

impl GitOps for RealGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<Output, GitError> {
        let mut args = vec!["clone", "--quiet"];
        if let Some(branch) = &self.branch {
            args.extend(["--branch", branch.as_str()]);
        }
        args.extend(["--", url, "."]);
        self.run(self.command(dest, &args))
    }

    fn status_porcelain(&self, path: &Path) -> Result<Output, GitError> {
        self.run(self.command(path, &["status", "--porcelain", "-z"]))
    }

    fn add_files(&self, path: &Path, files: &[String]) -> Result<Output, GitError> {
        // Titles may contain glob characters; match paths literally.
        let mut args = vec!["--literal-pathspecs", "add", "--"];
        let file_refs: Vec<&str> = files.iter().map(|s| s.as_str()).collect();
        args.extend(file_refs);
        self.run(self.command(path, &args))
    }

    fn commit(&self, path: &Path, message: &str, author: &Author) -> Result<Output, GitError> {
        let when = Utc::now().to_rfc3339();
        let mut cmd = self.command(path, &["commit", "--quiet", "-m", message]);
        cmd.env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_AUTHOR_DATE", &when)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email)
            .env("GIT_COMMITTER_DATE", &when);
        self.run(cmd)
    }

    fn push(&self, path: &Path, remote: &str, refspec: &str) -> Result<Output, GitError> {
        self.run(self.command(path, &["push", "--quiet", remote, refspec]))
    }
}

/// One entry of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter `XY` status code, e.g. `"A "` or `" M"`.
    pub code: String,
    pub path: String,
}

/// Parse NUL-separated `git status --porcelain -z` output.
///
/// Renames and copies carry their source path as an extra field, which is
/// folded into the same entry.
pub fn parse_status(stdout: &[u8]) -> Vec<StatusEntry> {
    let text = String::from_utf8_lossy(stdout);
    let mut fields = text.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();

    while let Some(field) = fields.next() {
        if field.len() < 3 || !field.is_char_boundary(2) {
            continue;
        }
        let (code, rest) = field.split_at(2);
        if code.starts_with('R') || code.starts_with('C') {
            fields.next();
        }
        entries.push(StatusEntry {
            code: code.to_string(),
            path: rest.strip_prefix(' ').unwrap_or(rest).to_string(),
        });
    }
    entries
}
