/// The story engine: interaction → segment orchestration.
///
/// Wires together the classifier, evolver, composer and merge engine
/// behind the narrative operations a host calls. The engine itself holds
/// no per-narrative state; contexts and random sources are passed in.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;
use thiserror::Error;

use crate::core::catalog::{CatalogError, TemplateCatalog};
use crate::core::classifier::InteractionClassifier;
use crate::core::composer::SegmentComposer;
use crate::core::config::{ConfigError, StoryConfig};
use crate::core::context::{StoryContext, StoryEvent};
use crate::core::evolver::ContextEvolver;
use crate::core::merge::{MergeEngine, MergeError, MergeOutcome};
use crate::schema::interaction::{Interaction, InteractionError};
use crate::schema::merge::{MergeDecision, MergeRequest, MergeRequestId};
use crate::schema::segment::{NarrativeId, Segment};
use crate::schema::story::{Genre, InvalidEnumValue, Mood};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    InvalidValue(#[from] InvalidEnumValue),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
}

/// Result of advancing a narrative by one interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    Segment(Segment),
    /// The narrative reached its maximum length and produces no more text.
    Finished,
}

impl Continuation {
    pub fn segment(&self) -> Option<&Segment> {
        match self {
            Continuation::Segment(segment) => Some(segment),
            Continuation::Finished => None,
        }
    }

    pub fn into_segment(self) -> Option<Segment> {
        match self {
            Continuation::Segment(segment) => Some(segment),
            Continuation::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Continuation::Finished)
    }
}

/// Random source for a narrative: seeded when a seed is given, otherwise
/// drawn from OS entropy.
pub fn narrative_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// The top-level story engine. Built via `StoryEngine::builder()`.
#[derive(Debug)]
pub struct StoryEngine {
    config: StoryConfig,
    catalog: TemplateCatalog,
    classifier: InteractionClassifier,
    evolver: ContextEvolver,
    composer: SegmentComposer,
    merges: MergeEngine,
}

/// Builder for constructing a `StoryEngine`.
#[derive(Debug, Default)]
pub struct StoryEngineBuilder {
    config_path: Option<String>,
    catalog_paths: Vec<String>,
    /// Directly provided config (for testing without files).
    config: Option<StoryConfig>,
    /// Directly provided catalog, replacing the builtin tables.
    catalog: Option<TemplateCatalog>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder::default()
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn merges(&self) -> &MergeEngine {
        &self.merges
    }

    /// Begin a new narrative. Missing genre or mood is picked at random.
    pub fn start_narrative<R: Rng + ?Sized>(
        &self,
        id: NarrativeId,
        genre: Option<Genre>,
        mood: Option<Mood>,
        rng: &mut R,
    ) -> (StoryContext, Segment) {
        let genre = genre.or_else(|| Genre::ALL.choose(rng).copied()).unwrap_or(Genre::Fantasy);
        let mood = mood.or_else(|| Mood::ALL.choose(rng).copied()).unwrap_or(Mood::Mysterious);

        let mut ctx = StoryContext::new(id, mood, genre, self.config.recent_event_capacity);
        let segment = self.open(&mut ctx, rng);
        tracing::info!(narrative = %id, genre = %genre, mood = %mood, "Narrative started");
        (ctx, segment)
    }

    /// Advance a narrative by one interaction.
    ///
    /// Once the next segment would push the story past `max_story_length`
    /// the context is concluded and every later call returns
    /// [`Continuation::Finished`] without touching it.
    pub fn continue_narrative<R: Rng + ?Sized>(
        &self,
        ctx: &mut StoryContext,
        interaction: &Interaction,
        rng: &mut R,
    ) -> Continuation {
        if ctx.is_concluded() {
            return Continuation::Finished;
        }

        // 1. Classify
        let influence = self.classifier.classify(interaction);

        // 2-3. Evolve and compose on a working copy
        let mut next = ctx.clone();
        next.record_event(StoryEvent::Interaction(interaction.kind()));
        let evolution = self.evolver.apply(&mut next, &influence, rng);
        let composition = self.composer.compose(&mut next, &influence, &self.catalog, rng);

        // 4. Length guard
        if next.length() + composition.word_count > self.config.max_story_length {
            ctx.conclude();
            tracing::info!(narrative = %ctx.id(), length = ctx.length(), "Narrative reached maximum length");
            return Continuation::Finished;
        }

        // 5. Commit
        self.evolver.record_words(&mut next, composition.word_count);
        let sequence_number = next.take_sequence_number();
        *ctx = next;

        tracing::debug!(
            narrative = %ctx.id(),
            kind = ?interaction.kind(),
            tension = evolution.tension,
            phase = %evolution.phase,
            mood = %ctx.mood,
            words = composition.word_count,
            "Segment composed"
        );

        Continuation::Segment(Segment::new(ctx.id(), sequence_number, composition.content))
    }

    /// Set the mood from its name, e.g. `"dark"`.
    pub fn set_mood(&self, ctx: &mut StoryContext, mood: &str) -> Result<(), EngineError> {
        let mood: Mood = mood.parse()?;
        if ctx.mood != mood {
            ctx.mood = mood;
            ctx.add_theme(mood.theme());
            tracing::debug!(narrative = %ctx.id(), mood = %mood, "Mood set");
        }
        Ok(())
    }

    /// Set the genre from its name, e.g. `"scifi"`.
    pub fn set_genre(&self, ctx: &mut StoryContext, genre: &str) -> Result<(), EngineError> {
        let genre: Genre = genre.parse()?;
        ctx.genre = genre;
        tracing::debug!(narrative = %ctx.id(), genre = %genre, "Genre set");
        Ok(())
    }

    /// Throw away a narrative's progress and open it again under the same
    /// ID, mood and genre. Sequence numbers continue from where the old
    /// story stopped. Pending merges involving it are expired.
    pub fn restart_narrative<R: Rng + ?Sized>(&self, ctx: &mut StoryContext, rng: &mut R) -> Segment {
        let id = ctx.id();
        self.merges.expire_involving(id);
        *ctx = ctx.restarted();
        let segment = self.open(ctx, rng);
        tracing::info!(narrative = %id, "Narrative restarted");
        segment
    }

    pub fn request_merge(
        &self,
        source: &StoryContext,
        target: &StoryContext,
        source_segment: &Segment,
    ) -> MergeRequest {
        self.merges.request(source, target, source_segment)
    }

    pub fn resolve_merge<R: Rng + ?Sized>(
        &self,
        id: MergeRequestId,
        decision: MergeDecision,
        source: &StoryContext,
        target: &mut StoryContext,
        rng: &mut R,
    ) -> Result<MergeOutcome, EngineError> {
        Ok(self
            .merges
            .resolve(id, decision, source, target, &self.catalog, rng)?)
    }

    pub fn pending_merges(&self, target: NarrativeId) -> Vec<MergeRequest> {
        self.merges.pending_for(target)
    }

    fn open<R: Rng + ?Sized>(&self, ctx: &mut StoryContext, rng: &mut R) -> Segment {
        let composition = self.composer.compose_opening(ctx, &self.catalog, rng);
        ctx.record_event(StoryEvent::Opening);
        self.evolver.record_words(ctx, composition.word_count);
        Segment::new(ctx.id(), ctx.take_sequence_number(), composition.content)
    }
}

impl StoryEngineBuilder {
    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Layer a RON catalog over the builtin tables. Later files win.
    pub fn catalog_path(mut self, path: &str) -> Self {
        self.catalog_paths.push(path.to_string());
        self
    }

    /// Provide a config directly (for testing without files).
    pub fn with_config(mut self, config: StoryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provide a catalog directly instead of the builtin tables.
    pub fn with_catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<StoryEngine, EngineError> {
        // Config file wins over a directly provided config
        let config = match self.config_path {
            Some(ref path) => StoryConfig::load_from_ron(Path::new(path))?,
            None => self.config.unwrap_or_default(),
        };
        config.validate()?;

        let mut catalog = match self.catalog {
            Some(catalog) => catalog,
            None => TemplateCatalog::builtin()?,
        };
        for path in &self.catalog_paths {
            if Path::new(path).exists() {
                catalog.merge(TemplateCatalog::load_from_ron(Path::new(path))?);
            } else {
                tracing::warn!(path = %path, "Catalog file not found, skipping");
            }
        }
        catalog.validate()?;

        tracing::debug!(
            segment_chars = config.target_segment_chars,
            max_length = config.max_story_length,
            "Story engine built"
        );

        Ok(StoryEngine {
            classifier: InteractionClassifier::new(&config),
            evolver: ContextEvolver::new(&config),
            composer: SegmentComposer::new(&config),
            merges: MergeEngine::new(&config),
            catalog,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::story::NarrativePhase;

    fn engine() -> StoryEngine {
        StoryEngine::builder().build().unwrap()
    }

    #[test]
    fn opening_starts_calm() {
        let engine = engine();
        let mut rng = narrative_rng(Some(1));
        let (ctx, opening) = engine.start_narrative(NarrativeId(1), Some(Genre::Fantasy), None, &mut rng);
        assert!(!opening.content.is_empty());
        assert!(!opening.is_merged);
        assert_eq!(opening.sequence_number, 0);
        assert_eq!(ctx.tension(), 0.0);
        assert_eq!(ctx.phase(), NarrativePhase::Building);
        assert_eq!(ctx.genre, Genre::Fantasy);
        assert_eq!(ctx.length(), opening.word_count());
        assert_eq!(ctx.recent_events().last(), Some(&StoryEvent::Opening));
    }

    #[test]
    fn sequence_numbers_increase() {
        let engine = engine();
        let mut rng = narrative_rng(Some(2));
        let (mut ctx, _) = engine.start_narrative(NarrativeId(1), None, None, &mut rng);
        for expected in 1..6 {
            let segment = engine
                .continue_narrative(&mut ctx, &Interaction::click(1.0, 1.0), &mut rng)
                .into_segment()
                .unwrap();
            assert_eq!(segment.sequence_number, expected);
            assert_eq!(segment.narrative, NarrativeId(1));
        }
        assert_eq!(ctx.tally().click, 5);
    }

    #[test]
    fn set_mood_validates_name() {
        let engine = engine();
        let mut rng = narrative_rng(Some(3));
        let (mut ctx, _) = engine.start_narrative(NarrativeId(1), None, Some(Mood::Mysterious), &mut rng);
        engine.set_mood(&mut ctx, "Whimsical").unwrap();
        assert_eq!(ctx.mood, Mood::Whimsical);
        assert!(ctx.themes().contains("wonder"));

        let before = ctx.clone();
        assert!(matches!(engine.set_mood(&mut ctx, "grumpy"), Err(EngineError::InvalidValue(_))));
        assert!(matches!(engine.set_genre(&mut ctx, "western"), Err(EngineError::InvalidValue(_))));
        assert_eq!(ctx, before);

        engine.set_genre(&mut ctx, "scifi").unwrap();
        assert_eq!(ctx.genre, Genre::Scifi);
    }

    #[test]
    fn finishes_at_max_length() {
        let config = StoryConfig {
            max_story_length: 60,
            ..StoryConfig::default()
        };
        let engine = StoryEngine::builder().with_config(config).build().unwrap();
        let mut rng = narrative_rng(Some(4));
        let (mut ctx, _) = engine.start_narrative(NarrativeId(1), None, None, &mut rng);

        let mut finished = false;
        for _ in 0..100 {
            match engine.continue_narrative(&mut ctx, &Interaction::scroll(50.0), &mut rng) {
                Continuation::Segment(_) => assert!(ctx.length() <= 60),
                Continuation::Finished => {
                    finished = true;
                    break;
                }
            }
        }
        assert!(finished);
        assert!(ctx.is_concluded());

        let frozen = ctx.clone();
        assert!(engine
            .continue_narrative(&mut ctx, &Interaction::scroll(50.0), &mut rng)
            .is_finished());
        assert_eq!(ctx, frozen);
    }

    #[test]
    fn restart_reopens_same_narrative() {
        let engine = engine();
        let mut rng = narrative_rng(Some(5));
        let (mut ctx, _) = engine.start_narrative(NarrativeId(9), Some(Genre::Horror), Some(Mood::Dark), &mut rng);
        for _ in 0..5 {
            engine.continue_narrative(&mut ctx, &Interaction::scroll(300.0), &mut rng);
        }
        let (other, other_latest) = engine.start_narrative(NarrativeId(10), None, None, &mut rng);
        let pending = engine.request_merge(&other, &ctx, &other_latest);

        let issued = ctx.segment_count();
        let opening = engine.restart_narrative(&mut ctx, &mut rng);
        assert_eq!(opening.sequence_number, issued);
        assert_eq!(ctx.id(), NarrativeId(9));
        assert_eq!(ctx.genre, Genre::Horror);
        assert_eq!(ctx.tension(), 0.0);
        assert_eq!(ctx.segment_count(), issued + 1);
        assert!(engine.pending_merges(NarrativeId(9)).is_empty());
        assert!(!engine.merges().get(pending.id).unwrap().is_pending());
    }

    #[test]
    fn missing_catalog_file_is_skipped() {
        let engine = StoryEngine::builder()
            .catalog_path("does/not/exist.ron")
            .build()
            .unwrap();
        assert!(engine.catalog().validate().is_ok());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = StoryConfig {
            calm_threshold: 0.9,
            ..StoryConfig::default()
        };
        assert!(matches!(
            StoryEngine::builder().with_config(config).build(),
            Err(EngineError::Config(ConfigError::Invalid(_)))
        ));
    }
}
