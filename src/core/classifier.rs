/// Interaction classifier: raw interaction → normalized influence.

use crate::core::config::StoryConfig;
use crate::schema::interaction::{Influence, Interaction};
use crate::schema::story::Mood;

/// Stateless mapping from interactions to influences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionClassifier {
    scroll_sensitivity: f64,
    max_tension_step: f64,
    click_introduce_boost: f64,
}

impl InteractionClassifier {
    pub fn new(config: &StoryConfig) -> Self {
        Self {
            scroll_sensitivity: config.scroll_sensitivity,
            max_tension_step: config.max_tension_step,
            click_introduce_boost: config.click_introduce_boost,
        }
    }

    pub fn classify(&self, interaction: &Interaction) -> Influence {
        match interaction {
            Interaction::Scroll { amount } => Influence {
                tension_delta: self.scroll_delta(*amount),
                ..Influence::neutral()
            },
            Interaction::Click { .. } => Influence {
                introduce_probability_boost: self.click_introduce_boost,
                ..Influence::neutral()
            },
            Interaction::Keypress { key } => Influence {
                forced_mood: Mood::from_shortcut(key),
                ..Influence::neutral()
            },
            Interaction::Unrecognized => {
                tracing::debug!("Unrecognized interaction, using ambient drift");
                Influence::neutral()
            }
        }
    }

    /// Tension delta for a scroll of `amount`, capped at the per-step maximum.
    pub fn scroll_delta(&self, amount: f64) -> f64 {
        if !amount.is_finite() {
            return if amount.is_nan() { 0.0 } else { self.max_tension_step };
        }
        (amount.abs() * self.scroll_sensitivity).min(self.max_tension_step)
    }

    pub fn max_tension_step(&self) -> f64 {
        self.max_tension_step
    }
}
