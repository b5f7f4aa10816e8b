/// Pacing configuration for story generation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Every tunable constant the generator consumes. Loaded from RON; any
/// field left out keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Character budget for one segment.
    pub target_segment_chars: usize,
    /// Word count after which a narrative stops producing segments.
    pub max_story_length: usize,
    /// BUILDING → CLIMAX once tension reaches this.
    pub climax_threshold: f64,
    /// RESOLUTION → BUILDING once tension drops below this.
    pub calm_threshold: f64,
    /// Scale applied to every tension delta.
    pub decay_factor: f64,
    /// Tension released per step while resolving.
    pub resolution_release: f64,
    /// Tension injected into the target of an accepted merge.
    pub merge_tension_bump: f64,
    /// Tension per unit of scroll distance.
    pub scroll_sensitivity: f64,
    /// Upper bound on the tension delta of a single interaction.
    pub max_tension_step: f64,
    pub click_introduce_boost: f64,
    pub location_probability: f64,
    pub introduce_probability: f64,
    /// (min, max) random tension change on steps without a tension delta.
    pub ambient_drift: (f64, f64),
    pub mood_drift_probability: f64,
    pub genre_drift_probability: f64,
    pub recent_event_capacity: usize,
    /// Consecutive scrolls that count as a burst.
    pub burst_window: usize,
    pub burst_multiplier: f64,
    /// Maximum number of live narratives in a store.
    pub store_capacity: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            target_segment_chars: 320,
            max_story_length: 5000,
            climax_threshold: 0.85,
            calm_threshold: 0.3,
            decay_factor: 0.6,
            resolution_release: 0.2,
            merge_tension_bump: 0.2,
            scroll_sensitivity: 0.001,
            max_tension_step: 0.25,
            click_introduce_boost: 0.3,
            location_probability: 0.4,
            introduce_probability: 0.3,
            ambient_drift: (-0.05, 0.08),
            mood_drift_probability: 0.15,
            genre_drift_probability: 0.05,
            recent_event_capacity: 8,
            burst_window: 4,
            burst_multiplier: 1.5,
            store_capacity: 1024,
        }
    }
}

impl StoryConfig {
    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StoryConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a configuration from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryConfig, ConfigError> {
        let config: StoryConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be within [0, 1], got {}", name, v)))
            }
        };
        let non_negative = |name: &str, v: f64| {
            if v >= 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be non-negative, got {}", name, v)))
            }
        };

        unit("climax_threshold", self.climax_threshold)?;
        unit("calm_threshold", self.calm_threshold)?;
        if self.calm_threshold >= self.climax_threshold {
            return Err(ConfigError::Invalid(format!(
                "calm_threshold ({}) must be below climax_threshold ({})",
                self.calm_threshold, self.climax_threshold
            )));
        }
        unit("decay_factor", self.decay_factor)?;
        unit("resolution_release", self.resolution_release)?;
        unit("merge_tension_bump", self.merge_tension_bump)?;
        unit("max_tension_step", self.max_tension_step)?;
        unit("click_introduce_boost", self.click_introduce_boost)?;
        unit("location_probability", self.location_probability)?;
        unit("introduce_probability", self.introduce_probability)?;
        unit("mood_drift_probability", self.mood_drift_probability)?;
        unit("genre_drift_probability", self.genre_drift_probability)?;
        non_negative("scroll_sensitivity", self.scroll_sensitivity)?;
        non_negative("burst_multiplier", self.burst_multiplier)?;

        let (lo, hi) = self.ambient_drift;
        if !(lo <= hi && lo >= -1.0 && hi <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "ambient_drift must be an ordered range within [-1, 1], got ({}, {})",
                lo, hi
            )));
        }
        if self.target_segment_chars == 0 {
            return Err(ConfigError::Invalid("target_segment_chars must be positive".to_string()));
        }
        if self.max_story_length == 0 {
            return Err(ConfigError::Invalid("max_story_length must be positive".to_string()));
        }
        if self.recent_event_capacity == 0 {
            return Err(ConfigError::Invalid("recent_event_capacity must be positive".to_string()));
        }
        if self.burst_window > self.recent_event_capacity {
            return Err(ConfigError::Invalid(format!(
                "burst_window ({}) cannot exceed recent_event_capacity ({})",
                self.burst_window, self.recent_event_capacity
            )));
        }
        if self.store_capacity == 0 {
            return Err(ConfigError::Invalid("store_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StoryConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = StoryConfig::parse_ron("(target_segment_chars: 120, climax_threshold: 0.9)").unwrap();
        assert_eq!(config.target_segment_chars, 120);
        assert_eq!(config.climax_threshold, 0.9);
        assert_eq!(config.calm_threshold, StoryConfig::default().calm_threshold);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let err = StoryConfig::parse_ron("(climax_threshold: 0.2, calm_threshold: 0.5)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn out_of_range_probability_rejected() {
        assert!(StoryConfig::parse_ron("(introduce_probability: 1.5)").is_err());
        assert!(StoryConfig::parse_ron("(ambient_drift: (0.2, -0.2))").is_err());
        assert!(StoryConfig::parse_ron("(target_segment_chars: 0)").is_err());
        assert!(StoryConfig::parse_ron("(burst_window: 20)").is_err());
    }

    #[test]
    fn malformed_ron_is_a_ron_error() {
        assert!(matches!(
            StoryConfig::parse_ron("(target_segment_chars: \"lots\")"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn load_test_config_from_ron() {
        let path = std::path::PathBuf::from("tests/fixtures/test_config.ron");
        let config = StoryConfig::load_from_ron(&path).unwrap();
        assert_eq!(config.target_segment_chars, 200);
        assert_eq!(config.max_story_length, 400);
    }
}
