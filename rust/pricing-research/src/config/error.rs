//! Startup configuration errors.
//!
//! Every variant names the offending setting and the environment variable or
//! value that fixes it, so an operator can repair a deployment from the log
//! line alone.

use thiserror::Error;

/// A configuration problem found while loading or validating [`AppConfig`].
///
/// [`AppConfig`]: super::AppConfig
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// A value is out of range or malformed.
    #[error("Invalid setting: {problem}\n  fix: {fix}")]
    Invalid { problem: String, fix: String },

    /// Two values contradict each other, e.g. a chunk overlap that is not
    /// smaller than the chunk size.
    #[error("Conflicting settings: {setting} vs {conflicts_with}\n  {reason}")]
    Incompatible {
        setting: String,
        conflicts_with: String,
        reason: String,
    },

    /// A credential or endpoint the pipeline cannot run without.
    #[error("Missing {setting} (needed for {needed_for})\n  set {env_var}")]
    MissingRequired {
        setting: String,
        needed_for: String,
        env_var: String,
    },

    /// Several problems, reported together.
    #[error("{} configuration problems:\n{}", .0.len(), numbered(.0))]
    Multiple(Vec<ConfigurationError>),
}

fn numbered(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("\n{}. {err}", i + 1))
        .collect()
}

impl ConfigurationError {
    #[must_use]
    pub fn invalid(problem: impl Into<String>, fix: impl Into<String>) -> Self {
        Self::Invalid {
            problem: problem.into(),
            fix: fix.into(),
        }
    }

    #[must_use]
    pub fn incompatible(
        setting: impl Into<String>,
        conflicts_with: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Incompatible {
            setting: setting.into(),
            conflicts_with: conflicts_with.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn missing_required(
        setting: impl Into<String>,
        needed_for: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self::MissingRequired {
            setting: setting.into(),
            needed_for: needed_for.into(),
            env_var: env_var.into(),
        }
    }

    /// `Ok` for no problems, the problem itself for one, `Multiple` otherwise.
    pub fn collect(mut errors: Vec<ConfigurationError>) -> ConfigResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Number of problems carried.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
