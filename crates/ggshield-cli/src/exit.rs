//! Process exit codes.

use ggshield_plugins::PluginError;

/// Exit status of a CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitCode {
    /// Command completed.
    Success,
    /// Bad input, or the target is not in the required state.
    UsageError,
    /// Network, transport security, verification or I/O failure.
    UnexpectedError,
    /// Status returned by a plugin command.
    Plugin(u8),
}

impl ExitCode {
    /// Numeric process status.
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::UsageError => 2,
            Self::UnexpectedError => 128,
            Self::Plugin(code) => code,
        }
    }

    /// Map a plugin command's status; values outside `0..=255` are unexpected.
    pub(crate) fn from_plugin(code: i32) -> Self {
        match u8::try_from(code) {
            Ok(0) => Self::Success,
            Ok(code) => Self::Plugin(code),
            Err(_) => Self::UnexpectedError,
        }
    }

    /// Classify a plugin error.
    pub(crate) fn for_error(error: &PluginError) -> Self {
        match error {
            PluginError::InvalidSource(_)
            | PluginError::UnknownPlugin(_)
            | PluginError::NotEntitled { .. }
            | PluginError::InvalidName(_)
            | PluginError::NotInstalled(_) => Self::UsageError,
            _ => Self::UnexpectedError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.code())
    }
}
