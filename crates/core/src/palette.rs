//! Presentation metadata keyed by enum value.
//!
//! Views used to switch on status strings to pick a badge color and icon.
//! A [`Palette`] is that mapping as data: the engine never looks at it, the
//! rendering layer asks it for a [`Badge`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::predicate::fold_case;

/// Color family of a badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Info => "info",
            Tone::Success => "success",
            Tone::Warning => "warning",
            Tone::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub tone: Tone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Badge {
    pub fn new(tone: Tone) -> Self {
        Self {
            tone,
            icon: None,
            label: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Enum value -> badge, with a fallback for values nobody configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    #[serde(default)]
    entries: HashMap<String, Badge>,
    #[serde(default)]
    fallback: Badge,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the badge for `value` (matched case-insensitively).
    pub fn with(mut self, value: &str, badge: Badge) -> Self {
        self.entries.insert(fold_case(value), badge);
        self
    }

    pub fn with_fallback(mut self, badge: Badge) -> Self {
        self.fallback = badge;
        self
    }

    pub fn badge_for(&self, value: &str) -> &Badge {
        let folded = fold_case(value);
        self.entries
            .get(&folded)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(key, _)| fold_case(key) == folded)
                    .map(|(_, badge)| badge)
            })
            .unwrap_or(&self.fallback)
    }
}
