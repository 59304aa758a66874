use crate::backend::{BackendError, Label};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification state of one message.
///
/// Moves only forward: `Unknown -> Pending -> Ham | Spam | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationStatus {
    Unknown,
    Pending,
    Ham,
    Spam,
    Error,
}

impl ClassificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ham | Self::Spam | Self::Error)
    }

    /// Single-letter code used by the web client's state.
    pub fn code(&self) -> char {
        match self {
            Self::Unknown => 'U',
            Self::Pending => 'W',
            Self::Ham => 'H',
            Self::Spam => 'S',
            Self::Error => 'E',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "U" => Some(Self::Unknown),
            "W" => Some(Self::Pending),
            "H" => Some(Self::Ham),
            "S" => Some(Self::Spam),
            "E" => Some(Self::Error),
            _ => None,
        }
    }

    /// Anything that is not exactly `"ham"` counts as spam.
    pub fn from_outcome(outcome: &Result<Label, BackendError>) -> Self {
        match outcome {
            Ok(label) if label.is_ham() => Self::Ham,
            Ok(_) => Self::Spam,
            Err(_) => Self::Error,
        }
    }
}

impl fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Ham => "ham",
            Self::Spam => "spam",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconStyle {
    /// Spam and error get different icons.
    #[default]
    Distinct,
    /// Spam shares the error icon.
    Compact,
}

pub const UNKNOWN_ICON: &str = "?";

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPresenter {
    style: IconStyle,
}

impl StatusPresenter {
    pub fn new(style: IconStyle) -> Self {
        Self { style }
    }

    pub fn icon(&self, status: ClassificationStatus) -> &'static str {
        match status {
            ClassificationStatus::Unknown => "🔍",
            ClassificationStatus::Pending => "⏳",
            ClassificationStatus::Ham => "✅",
            ClassificationStatus::Spam => match self.style {
                IconStyle::Distinct => "🗑️",
                IconStyle::Compact => "❌",
            },
            ClassificationStatus::Error => "❌",
        }
    }

    pub fn render_code(&self, code: &str) -> &'static str {
        ClassificationStatus::from_code(code)
            .map(|status| self.icon(status))
            .unwrap_or(UNKNOWN_ICON)
    }
}
