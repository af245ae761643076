//! Command building utilities for the bridge process.

use std::path::PathBuf;

use thiserror::Error;

/// Command line used when none is configured.
pub const DEFAULT_BRIDGE_COMMAND: &str = "node sidecar/bridge.js";

/// Command build error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("Base command cannot be parsed: {0}")]
    InvalidBase(String),
    #[error("Base command is empty after parsing")]
    EmptyCommand,
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),
}

/// Parsed command parts (program + args).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParts {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandParts {
    /// Create new command parts.
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Resolve the program to an absolute path.
    ///
    /// # Errors
    /// Returns error if executable not found.
    pub async fn into_resolved(self) -> Result<(PathBuf, Vec<String>), CommandBuildError> {
        let Self { program, args } = self;
        let executable = resolve_executable_path(&program)
            .await
            .ok_or(CommandBuildError::ExecutableNotFound(program))?;
        Ok((executable, args))
    }
}

/// Builder for the bridge command line.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Base command line, shell-quoted.
    pub base: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_COMMAND)
    }
}

impl CommandBuilder {
    /// Create a new command builder.
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self { base: base.into() }
    }

    /// Build the command.
    ///
    /// # Errors
    /// Returns error if the base command cannot be split or is empty.
    pub fn build(&self) -> Result<CommandParts, CommandBuildError> {
        let mut parts = shlex::split(&self.base)
            .ok_or_else(|| CommandBuildError::InvalidBase(self.base.clone()))?;
        if parts.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }

        let program = parts.remove(0);
        Ok(CommandParts::new(program, parts))
    }
}

/// Resolve an executable name against `PATH`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = PathBuf::from(executable);
    if path.is_absolute() && path.is_file() {
        return Some(path);
    }

    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let parts = CommandBuilder::default().build().unwrap();
        assert_eq!(parts.program, "node");
        assert_eq!(parts.args, vec!["sidecar/bridge.js"]);
    }

    #[test]
    fn test_quoted_base() {
        let parts = CommandBuilder::new(r#"node "/opt/wa relay/bridge.js" --trace"#)
            .build()
            .unwrap();
        assert_eq!(parts.program, "node");
        assert_eq!(parts.args, vec!["/opt/wa relay/bridge.js", "--trace"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandBuilder::new("   ").build(),
            Err(CommandBuildError::EmptyCommand)
        ));
        assert!(matches!(
            CommandBuilder::new(r#"node "unterminated"#).build(),
            Err(CommandBuildError::InvalidBase(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_executable_not_resolved() {
        let parts = CommandParts::new("definitely-not-a-real-binary-xyz".into(), vec![]);
        assert!(matches!(
            parts.into_resolved().await,
            Err(CommandBuildError::ExecutableNotFound(_))
        ));
    }
}
