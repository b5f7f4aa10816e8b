use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A mood or genre name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value: '{value}'")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

/// The emotional register of a narrative. Drives transition and action pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Mysterious,
    Adventurous,
    Dark,
    Whimsical,
    Romantic,
    Suspenseful,
    Philosophical,
}

/// Broad emotional family of a mood, used to judge how well two moods blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Temperament {
    Light,
    Shadow,
    Contemplative,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Mysterious,
        Mood::Adventurous,
        Mood::Dark,
        Mood::Whimsical,
        Mood::Romantic,
        Mood::Suspenseful,
        Mood::Philosophical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mysterious => "mysterious",
            Self::Adventurous => "adventurous",
            Self::Dark => "dark",
            Self::Whimsical => "whimsical",
            Self::Romantic => "romantic",
            Self::Suspenseful => "suspenseful",
            Self::Philosophical => "philosophical",
        }
    }

    /// The keyboard shortcut that forces this mood.
    pub fn shortcut(&self) -> char {
        match self {
            Self::Mysterious => 'm',
            Self::Adventurous => 'a',
            Self::Dark => 'd',
            Self::Whimsical => 'w',
            Self::Romantic => 'r',
            Self::Suspenseful => 's',
            Self::Philosophical => 'p',
        }
    }

    /// Resolve a keypress to a mood. Case-insensitive; only single characters match.
    pub fn from_shortcut(key: &str) -> Option<Mood> {
        let mut chars = key.chars();
        let c = chars.next()?.to_ascii_lowercase();
        if chars.next().is_some() {
            return None;
        }
        Self::ALL.into_iter().find(|m| m.shortcut() == c)
    }

    pub fn temperament(&self) -> Temperament {
        match self {
            Self::Adventurous | Self::Whimsical | Self::Romantic => Temperament::Light,
            Self::Dark | Self::Suspenseful | Self::Mysterious => Temperament::Shadow,
            Self::Philosophical => Temperament::Contemplative,
        }
    }

    /// Theme word recorded in a story's themes whenever it takes on this mood.
    pub fn theme(&self) -> &'static str {
        match self {
            Self::Mysterious => "secrets",
            Self::Adventurous => "courage",
            Self::Dark => "loss",
            Self::Whimsical => "wonder",
            Self::Romantic => "devotion",
            Self::Suspenseful => "dread",
            Self::Philosophical => "meaning",
        }
    }
}

/// The setting family of a narrative. Drives openings, locations and names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Fantasy,
    Scifi,
    Horror,
    Romance,
    Adventure,
    Mystery,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Fantasy,
        Genre::Scifi,
        Genre::Horror,
        Genre::Romance,
        Genre::Adventure,
        Genre::Mystery,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fantasy => "fantasy",
            Self::Scifi => "scifi",
            Self::Horror => "horror",
            Self::Romance => "romance",
            Self::Adventure => "adventure",
            Self::Mystery => "mystery",
        }
    }
}

/// Position in the cyclic tension arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativePhase {
    Building,
    Climax,
    Resolution,
}

impl NarrativePhase {
    pub const ALL: [NarrativePhase; 3] = [
        NarrativePhase::Building,
        NarrativePhase::Climax,
        NarrativePhase::Resolution,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Climax => "climax",
            Self::Resolution => "resolution",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for NarrativePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mood {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| InvalidEnumValue {
                kind: "mood",
                value: s.to_string(),
            })
    }
}

impl FromStr for Genre {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|g| g.name() == wanted)
            .ok_or_else(|| InvalidEnumValue {
                kind: "genre",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_names_round_trip() {
        for mood in Mood::ALL {
            assert_eq!(mood.name().parse::<Mood>().unwrap(), mood);
        }
        assert_eq!("  DARK ".parse::<Mood>().unwrap(), Mood::Dark);
    }

    #[test]
    fn genre_names_round_trip() {
        for genre in Genre::ALL {
            assert_eq!(genre.name().parse::<Genre>().unwrap(), genre);
        }
    }

    #[test]
    fn invalid_names_rejected() {
        let err = "gloomy".parse::<Mood>().unwrap_err();
        assert_eq!(err.kind, "mood");
        assert_eq!(err.value, "gloomy");
        assert_eq!(err.to_string(), "invalid mood value: 'gloomy'");

        let err = "western".parse::<Genre>().unwrap_err();
        assert_eq!(err.kind, "genre");
    }

    #[test]
    fn shortcuts_are_unique_and_resolve() {
        let mut seen = std::collections::HashSet::new();
        for mood in Mood::ALL {
            assert!(seen.insert(mood.shortcut()));
            assert_eq!(Mood::from_shortcut(&mood.shortcut().to_string()), Some(mood));
        }
        assert_eq!(Mood::from_shortcut("D"), Some(Mood::Dark));
        assert_eq!(Mood::from_shortcut("x"), None);
        assert_eq!(Mood::from_shortcut("dd"), None);
        assert_eq!(Mood::from_shortcut(""), None);
    }

    #[test]
    fn temperaments() {
        assert_eq!(Mood::Whimsical.temperament(), Temperament::Light);
        assert_eq!(Mood::Dark.temperament(), Temperament::Shadow);
        assert_eq!(Mood::Philosophical.temperament(), Temperament::Contemplative);
    }

    #[test]
    fn serde_uses_snake_case_names() {
        assert_eq!(serde_json::to_string(&Mood::Suspenseful).unwrap(), "\"suspenseful\"");
        assert_eq!(serde_json::to_string(&NarrativePhase::Climax).unwrap(), "\"climax\"");
    }
}
