//! Display Fragments
//!
//! A [`Fragment`] is one module's rendered display unit for one cycle. It
//! serializes to an i3bar block object: `full_text` is always present, the
//! optional fields are omitted when unset.

use serde::{Deserialize, Serialize};

/// One rendered status block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Text shown on the bar
    pub full_text: String,
    /// Foreground color (`#rrggbb`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Block name, echoed back by the host in click events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Block instance, disambiguates blocks sharing a name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Whether the host should highlight the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
}

impl Fragment {
    /// Create a fragment with only text set
    pub fn new(full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            color: None,
            name: None,
            instance: None,
            urgent: None,
        }
    }

    /// Set the color
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the block name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the block urgent (or explicitly not urgent)
    #[must_use]
    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = Some(urgent);
        self
    }
}

/// Presentation attributes shared by the built-in modules
///
/// Applied on top of whatever text a module renders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FragmentStyle {
    /// Block name
    pub name: Option<String>,
    /// Block instance
    pub instance: Option<String>,
    /// Foreground color
    pub color: Option<String>,
}

impl FragmentStyle {
    /// Build a fragment from rendered text, applying this style
    #[must_use]
    pub fn render(&self, full_text: impl Into<String>) -> Fragment {
        Fragment {
            full_text: full_text.into(),
            color: self.color.clone(),
            name: self.name.clone(),
            instance: self.instance.clone(),
            urgent: None,
        }
    }
}

/// Substitute `value` for every `{}` in `format`
#[must_use]
pub fn render_template(format: &str, value: &str) -> String {
    format.replace("{}", value)
}
