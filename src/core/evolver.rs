/// Context evolver: advances mood, tension and phase for one step.
///
/// Steps are applied in a fixed order: mood override (or drift), tension
/// blend, phase transition. Word accounting happens after composition via
/// [`ContextEvolver::record_words`].

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::config::StoryConfig;
use crate::core::context::StoryContext;
use crate::schema::interaction::Influence;
use crate::schema::story::{Genre, Mood, NarrativePhase};

/// What changed during one evolution step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evolution {
    pub previous_phase: NarrativePhase,
    pub phase: NarrativePhase,
    pub mood_changed: bool,
    pub tension: f64,
}

impl Evolution {
    pub fn phase_changed(&self) -> bool {
        self.previous_phase != self.phase
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextEvolver {
    climax_threshold: f64,
    calm_threshold: f64,
    decay_factor: f64,
    resolution_release: f64,
    max_tension_step: f64,
    ambient_drift: (f64, f64),
    mood_drift_probability: f64,
    genre_drift_probability: f64,
    burst_window: usize,
    burst_multiplier: f64,
}

impl ContextEvolver {
    pub fn new(config: &StoryConfig) -> Self {
        Self {
            climax_threshold: config.climax_threshold,
            calm_threshold: config.calm_threshold,
            decay_factor: config.decay_factor,
            resolution_release: config.resolution_release,
            max_tension_step: config.max_tension_step,
            ambient_drift: config.ambient_drift,
            mood_drift_probability: config.mood_drift_probability,
            genre_drift_probability: config.genre_drift_probability,
            burst_window: config.burst_window,
            burst_multiplier: config.burst_multiplier,
        }
    }

    /// Apply an influence to the context.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        ctx: &mut StoryContext,
        influence: &Influence,
        rng: &mut R,
    ) -> Evolution {
        let previous_phase = ctx.phase();

        // 1. Mood: a forced mood wins outright, otherwise the story may drift
        let previous_mood = ctx.mood;
        match influence.forced_mood {
            Some(mood) => ctx.mood = mood,
            None => {
                if rng.gen_bool(self.mood_drift_probability) {
                    if let Some(mood) = Mood::ALL.choose(rng) {
                        ctx.mood = *mood;
                    }
                }
                if rng.gen_bool(self.genre_drift_probability) {
                    if let Some(genre) = Genre::ALL.choose(rng) {
                        ctx.genre = *genre;
                    }
                }
            }
        }
        let mood_changed = ctx.mood != previous_mood;
        if mood_changed {
            ctx.add_theme(ctx.mood.theme());
        }

        // 2. Tension
        let step = if influence.tension_delta != 0.0 {
            self.blended_step(ctx, influence.tension_delta)
        } else {
            let (lo, hi) = self.ambient_drift;
            rng.gen_range(lo..=hi)
        };
        let release = if previous_phase == NarrativePhase::Resolution {
            self.resolution_release
        } else {
            0.0
        };
        ctx.set_tension(ctx.tension() + step - release);

        // 3. Phase
        let phase = self.next_phase(previous_phase, ctx.tension());
        ctx.set_phase(phase);

        if phase != previous_phase {
            tracing::debug!(
                narrative = %ctx.id(),
                from = %previous_phase,
                to = %phase,
                tension = ctx.tension(),
                "Phase transition"
            );
        }

        Evolution {
            previous_phase,
            phase,
            mood_changed,
            tension: ctx.tension(),
        }
    }

    fn blended_step(&self, ctx: &StoryContext, delta: f64) -> f64 {
        let delta = if delta > 0.0 && ctx.recent_events().is_scroll_burst(self.burst_window) {
            (delta * self.burst_multiplier).min(self.max_tension_step)
        } else {
            delta
        };
        delta * self.decay_factor
    }

    /// The cyclic phase machine. CLIMAX lasts exactly one step.
    pub fn next_phase(&self, phase: NarrativePhase, tension: f64) -> NarrativePhase {
        match phase {
            NarrativePhase::Building if tension >= self.climax_threshold => NarrativePhase::Climax,
            NarrativePhase::Building => NarrativePhase::Building,
            NarrativePhase::Climax => NarrativePhase::Resolution,
            NarrativePhase::Resolution if tension < self.calm_threshold => NarrativePhase::Building,
            NarrativePhase::Resolution => NarrativePhase::Resolution,
        }
    }

    /// Account for the words of a segment about to be appended.
    pub fn record_words(&self, ctx: &mut StoryContext, words: usize) {
        ctx.add_words(words);
    }

    /// Raise tension by a fixed amount, as when another story is merged in.
    pub fn bump(&self, ctx: &mut StoryContext, amount: f64) {
        ctx.set_tension(ctx.tension() + amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::StoryEvent;
    use crate::schema::interaction::InteractionKind;
    use crate::schema::segment::NarrativeId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_config() -> StoryConfig {
        StoryConfig {
            mood_drift_probability: 0.0,
            genre_drift_probability: 0.0,
            ambient_drift: (0.0, 0.0),
            ..StoryConfig::default()
        }
    }

    fn context() -> StoryContext {
        StoryContext::new(NarrativeId(1), Mood::Mysterious, Genre::Fantasy, 8)
    }

    fn push(delta: f64) -> Influence {
        Influence {
            tension_delta: delta,
            ..Influence::neutral()
        }
    }

    #[test]
    fn forced_mood_overrides() {
        let evolver = ContextEvolver::new(&StoryConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = context();
        let influence = Influence {
            forced_mood: Some(Mood::Dark),
            ..Influence::neutral()
        };
        let evo = evolver.apply(&mut ctx, &influence, &mut rng);
        assert_eq!(ctx.mood, Mood::Dark);
        assert!(evo.mood_changed);
        assert!(ctx.themes().contains("loss"));
    }

    #[test]
    fn tension_blends_by_decay_factor() {
        let config = quiet_config();
        let evolver = ContextEvolver::new(&config);
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = context();
        evolver.apply(&mut ctx, &push(0.2), &mut rng);
        assert!((ctx.tension() - 0.2 * config.decay_factor).abs() < 1e-12);
    }

    #[test]
    fn tension_never_leaves_unit_interval() {
        let evolver = ContextEvolver::new(&StoryConfig::default());
        let mut rng = StdRng::seed_from_u64(9);
        let mut ctx = context();
        for i in 0..500 {
            let delta = if i % 3 == 0 { -5.0 } else { 5.0 };
            evolver.apply(&mut ctx, &push(delta), &mut rng);
            assert!((0.0..=1.0).contains(&ctx.tension()));
        }
    }

    #[test]
    fn phase_cycle_never_skips_climax() {
        let evolver = ContextEvolver::new(&quiet_config());
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = context();
        let mut phases = vec![ctx.phase()];
        for _ in 0..40 {
            evolver.apply(&mut ctx, &push(0.25), &mut rng);
            if *phases.last().unwrap() != ctx.phase() {
                phases.push(ctx.phase());
            }
        }
        assert_eq!(
            &phases[..3],
            &[NarrativePhase::Building, NarrativePhase::Climax, NarrativePhase::Resolution]
        );
        for pair in phases.windows(2) {
            let ok = matches!(
                (pair[0], pair[1]),
                (NarrativePhase::Building, NarrativePhase::Climax)
                    | (NarrativePhase::Climax, NarrativePhase::Resolution)
                    | (NarrativePhase::Resolution, NarrativePhase::Building)
            );
            assert!(ok, "illegal transition {:?}", pair);
        }
    }

    #[test]
    fn climax_lasts_one_step() {
        let evolver = ContextEvolver::new(&quiet_config());
        assert_eq!(evolver.next_phase(NarrativePhase::Climax, 1.0), NarrativePhase::Resolution);
        assert_eq!(evolver.next_phase(NarrativePhase::Building, 0.85), NarrativePhase::Climax);
        assert_eq!(evolver.next_phase(NarrativePhase::Building, 0.84), NarrativePhase::Building);
        assert_eq!(evolver.next_phase(NarrativePhase::Resolution, 0.29), NarrativePhase::Building);
        assert_eq!(evolver.next_phase(NarrativePhase::Resolution, 0.9), NarrativePhase::Resolution);
    }

    #[test]
    fn resolution_releases_tension() {
        let evolver = ContextEvolver::new(&quiet_config());
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = context();
        ctx.set_tension(0.9);
        ctx.set_phase(NarrativePhase::Resolution);
        evolver.apply(&mut ctx, &Influence::neutral(), &mut rng);
        assert!(ctx.tension() < 0.9);
    }

    #[test]
    fn scroll_burst_amplifies_step() {
        let config = quiet_config();
        let evolver = ContextEvolver::new(&config);
        let mut rng = StdRng::seed_from_u64(3);

        let mut calm = context();
        evolver.apply(&mut calm, &push(0.1), &mut rng);

        let mut burst = context();
        for _ in 0..config.burst_window {
            burst.record_event(StoryEvent::Interaction(InteractionKind::Scroll));
        }
        evolver.apply(&mut burst, &push(0.1), &mut rng);

        assert!(burst.tension() > calm.tension());
        assert!(burst.tension() <= config.max_tension_step * config.decay_factor + 1e-12);
    }

    #[test]
    fn bump_is_clamped() {
        let evolver = ContextEvolver::new(&StoryConfig::default());
        let mut ctx = context();
        ctx.set_tension(0.95);
        evolver.bump(&mut ctx, 0.2);
        assert_eq!(ctx.tension(), 1.0);
    }
}
