use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::story::Mood;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("invalid interaction kind: {0}")]
    InvalidInteractionKind(String),
}

/// A raw user interaction as delivered by the transport layer.
///
/// Decoded from `{"type": "scroll", "amount": 120}` style records. Any
/// `type` outside the known set decodes to [`Interaction::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    Scroll {
        #[serde(default)]
        amount: f64,
    },
    Click {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
    Keypress {
        #[serde(default)]
        key: String,
    },
    #[serde(other)]
    Unrecognized,
}

/// The shape of an interaction, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Scroll,
    Click,
    Keypress,
    Unrecognized,
}

impl Interaction {
    pub fn scroll(amount: f64) -> Self {
        Self::Scroll { amount }
    }

    pub fn click(x: f64, y: f64) -> Self {
        Self::Click { x, y }
    }

    pub fn keypress(key: impl Into<String>) -> Self {
        Self::Keypress { key: key.into() }
    }

    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Scroll { .. } => InteractionKind::Scroll,
            Self::Click { .. } => InteractionKind::Click,
            Self::Keypress { .. } => InteractionKind::Keypress,
            Self::Unrecognized => InteractionKind::Unrecognized,
        }
    }

    /// Decode an interaction record from JSON.
    pub fn from_json(input: &str) -> Result<Interaction, InteractionError> {
        serde_json::from_str(input)
            .map_err(|e| InteractionError::InvalidInteractionKind(e.to_string()))
    }

    /// Decode an interaction record, degrading malformed input to
    /// [`Interaction::Unrecognized`] so generation can carry on.
    pub fn from_json_lossy(input: &str) -> Interaction {
        match Self::from_json(input) {
            Ok(interaction) => interaction,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to ambient drift");
                Interaction::Unrecognized
            }
        }
    }
}

/// The normalized effect of one interaction on a story.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Influence {
    pub tension_delta: f64,
    pub introduce_probability_boost: f64,
    pub forced_mood: Option<Mood>,
}

impl Influence {
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn is_neutral(&self) -> bool {
        self.tension_delta == 0.0
            && self.introduce_probability_boost == 0.0
            && self.forced_mood.is_none()
    }
}
