/// Story context: the mutable state of one narrative.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::schema::interaction::InteractionKind;
use crate::schema::segment::NarrativeId;
use crate::schema::story::{Genre, Mood, NarrativePhase};

/// Something that happened to a story, as remembered in its recent history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryEvent {
    Opening,
    Interaction(InteractionKind),
    Merge,
}

/// Bounded history of recent story events; the oldest entry is evicted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEvents {
    capacity: usize,
    events: VecDeque<StoryEvent>,
}

impl RecentEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, event: StoryEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &StoryEvent> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&StoryEvent> {
        self.events.back()
    }

    /// True when the newest `window` events are all scrolls.
    pub fn is_scroll_burst(&self, window: usize) -> bool {
        window > 0
            && self.events.len() >= window
            && self
                .events
                .iter()
                .rev()
                .take(window)
                .all(|e| *e == StoryEvent::Interaction(InteractionKind::Scroll))
    }
}

/// Running count of interactions by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InteractionTally {
    pub scroll: u64,
    pub click: u64,
    pub keypress: u64,
    pub unrecognized: u64,
}

impl InteractionTally {
    pub fn record(&mut self, kind: InteractionKind) {
        match kind {
            InteractionKind::Scroll => self.scroll += 1,
            InteractionKind::Click => self.click += 1,
            InteractionKind::Keypress => self.keypress += 1,
            InteractionKind::Unrecognized => self.unrecognized += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.scroll + self.click + self.keypress + self.unrecognized
    }
}

/// Per-narrative state. Tension stays within `[0, 1]`, element sets only
/// grow, and length never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryContext {
    id: NarrativeId,
    pub mood: Mood,
    pub genre: Genre,
    tension: f64,
    phase: NarrativePhase,
    characters: BTreeSet<String>,
    locations: BTreeSet<String>,
    themes: BTreeSet<String>,
    length: usize,
    segment_count: u64,
    concluded: bool,
    recent_events: RecentEvents,
    tally: InteractionTally,
}

impl StoryContext {
    pub fn new(id: NarrativeId, mood: Mood, genre: Genre, recent_event_capacity: usize) -> Self {
        Self {
            id,
            mood,
            genre,
            tension: 0.0,
            phase: NarrativePhase::Building,
            characters: BTreeSet::new(),
            locations: BTreeSet::new(),
            themes: BTreeSet::new(),
            length: 0,
            segment_count: 0,
            concluded: false,
            recent_events: RecentEvents::new(recent_event_capacity),
            tally: InteractionTally::default(),
        }
    }

    /// A fresh context for the same narrative. Mood and genre carry over,
    /// and so does the segment count, so sequence numbers keep increasing
    /// across the restart.
    pub fn restarted(&self) -> Self {
        Self {
            segment_count: self.segment_count,
            ..Self::new(self.id, self.mood, self.genre, self.recent_events.capacity())
        }
    }

    pub fn id(&self) -> NarrativeId {
        self.id
    }

    pub fn tension(&self) -> f64 {
        self.tension
    }

    /// Set tension, clamped into `[0, 1]`. NaN is treated as zero.
    pub fn set_tension(&mut self, tension: f64) {
        self.tension = if tension.is_nan() { 0.0 } else { tension.clamp(0.0, 1.0) };
    }

    pub fn phase(&self) -> NarrativePhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: NarrativePhase) {
        self.phase = phase;
    }

    pub fn characters(&self) -> &BTreeSet<String> {
        &self.characters
    }

    pub fn locations(&self) -> &BTreeSet<String> {
        &self.locations
    }

    pub fn themes(&self) -> &BTreeSet<String> {
        &self.themes
    }

    /// Returns true if the character was not already known.
    pub fn introduce_character(&mut self, name: impl Into<String>) -> bool {
        self.characters.insert(name.into())
    }

    /// Returns true if the location was not already known.
    pub fn introduce_location(&mut self, name: impl Into<String>) -> bool {
        self.locations.insert(name.into())
    }

    /// Returns true if the theme was not already known.
    pub fn add_theme(&mut self, theme: impl Into<String>) -> bool {
        self.themes.insert(theme.into())
    }

    /// Union another story's characters, locations and themes into this one.
    pub fn absorb_elements(&mut self, other: &StoryContext) {
        self.characters.extend(other.characters.iter().cloned());
        self.locations.extend(other.locations.iter().cloned());
        self.themes.extend(other.themes.iter().cloned());
    }

    /// Total words appended so far.
    pub fn length(&self) -> usize {
        self.length
    }

    pub(crate) fn add_words(&mut self, words: usize) {
        self.length += words;
    }

    /// Number of segments issued under this ID, restarts included; also the
    /// next sequence number.
    pub fn segment_count(&self) -> u64 {
        self.segment_count
    }

    pub(crate) fn take_sequence_number(&mut self) -> u64 {
        let n = self.segment_count;
        self.segment_count += 1;
        n
    }

    /// True once the story has reached its maximum length.
    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    pub(crate) fn conclude(&mut self) {
        self.concluded = true;
    }

    pub fn recent_events(&self) -> &RecentEvents {
        &self.recent_events
    }

    pub(crate) fn record_event(&mut self, event: StoryEvent) {
        if let StoryEvent::Interaction(kind) = event {
            self.tally.record(kind);
        }
        self.recent_events.push(event);
    }

    pub fn tally(&self) -> &InteractionTally {
        &self.tally
    }

    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            narrative: self.id,
            mood: self.mood,
            genre: self.genre,
            tension: self.tension,
            phase: self.phase,
            characters: self.characters.iter().cloned().collect(),
            locations: self.locations.iter().cloned().collect(),
            themes: self.themes.iter().cloned().collect(),
            length: self.length,
            segment_count: self.segment_count,
            concluded: self.concluded,
            interactions: self.tally,
        }
    }
}

/// Plain snapshot of a story context for hosts to store or broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub narrative: NarrativeId,
    pub mood: Mood,
    pub genre: Genre,
    pub tension: f64,
    pub phase: NarrativePhase,
    pub characters: Vec<String>,
    pub locations: Vec<String>,
    pub themes: Vec<String>,
    pub length: usize,
    pub segment_count: u64,
    pub concluded: bool,
    pub interactions: InteractionTally,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroll() -> StoryEvent {
        StoryEvent::Interaction(InteractionKind::Scroll)
    }

    #[test]
    fn new_context_defaults() {
        let ctx = StoryContext::new(NarrativeId(1), Mood::Dark, Genre::Horror, 4);
        assert_eq!(ctx.tension(), 0.0);
        assert_eq!(ctx.phase(), NarrativePhase::Building);
        assert_eq!(ctx.length(), 0);
        assert!(ctx.characters().is_empty());
        assert!(!ctx.is_concluded());
    }

    #[test]
    fn restarted_context_keeps_numbering() {
        let mut ctx = StoryContext::new(NarrativeId(4), Mood::Romantic, Genre::Romance, 6);
        ctx.introduce_character("Ilse");
        ctx.set_tension(0.8);
        ctx.take_sequence_number();
        ctx.take_sequence_number();
        ctx.conclude();

        let fresh = ctx.restarted();
        assert_eq!(fresh.id(), NarrativeId(4));
        assert_eq!(fresh.mood, Mood::Romantic);
        assert_eq!(fresh.segment_count(), 2);
        assert_eq!(fresh.tension(), 0.0);
        assert!(fresh.characters().is_empty());
        assert!(!fresh.is_concluded());
        assert_eq!(fresh.recent_events().capacity(), 6);
    }

    #[test]
    fn tension_is_clamped() {
        let mut ctx = StoryContext::new(NarrativeId(1), Mood::Dark, Genre::Horror, 4);
        ctx.set_tension(1.7);
        assert_eq!(ctx.tension(), 1.0);
        ctx.set_tension(-0.2);
        assert_eq!(ctx.tension(), 0.0);
        ctx.set_tension(f64::NAN);
        assert_eq!(ctx.tension(), 0.0);
    }

    #[test]
    fn element_insertion_is_idempotent() {
        let mut ctx = StoryContext::new(NarrativeId(1), Mood::Dark, Genre::Horror, 4);
        assert!(ctx.introduce_character("Elena"));
        assert!(!ctx.introduce_character("Elena"));
        assert_eq!(ctx.characters().len(), 1);
    }

    #[test]
    fn absorb_unions_elements() {
        let mut a = StoryContext::new(NarrativeId(1), Mood::Dark, Genre::Horror, 4);
        let mut b = StoryContext::new(NarrativeId(2), Mood::Romantic, Genre::Romance, 4);
        a.introduce_character("Elena");
        a.introduce_location("the crypt");
        b.introduce_character("Magnus");
        b.introduce_character("Elena");
        b.add_theme("devotion");

        a.absorb_elements(&b);
        assert_eq!(a.characters().iter().collect::<Vec<_>>(), vec!["Elena", "Magnus"]);
        assert_eq!(a.locations().len(), 1);
        assert!(a.themes().contains("devotion"));
        // Source untouched
        assert_eq!(b.locations().len(), 0);
    }

    #[test]
    fn recent_events_evict_oldest() {
        let mut events = RecentEvents::new(3);
        events.push(StoryEvent::Opening);
        events.push(scroll());
        events.push(scroll());
        events.push(StoryEvent::Merge);
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().next(), Some(&scroll()));
        assert_eq!(events.last(), Some(&StoryEvent::Merge));
    }

    #[test]
    fn scroll_burst_detection() {
        let mut events = RecentEvents::new(5);
        events.push(StoryEvent::Opening);
        events.push(scroll());
        events.push(scroll());
        assert!(events.is_scroll_burst(2));
        assert!(!events.is_scroll_burst(3));
        assert!(!events.is_scroll_burst(0));
        events.push(StoryEvent::Interaction(InteractionKind::Click));
        assert!(!events.is_scroll_burst(1));
    }

    #[test]
    fn tally_counts_interactions_only() {
        let mut ctx = StoryContext::new(NarrativeId(1), Mood::Dark, Genre::Horror, 4);
        ctx.record_event(StoryEvent::Opening);
        ctx.record_event(scroll());
        ctx.record_event(StoryEvent::Interaction(InteractionKind::Keypress));
        assert_eq!(ctx.tally().scroll, 1);
        assert_eq!(ctx.tally().keypress, 1);
        assert_eq!(ctx.tally().total(), 2);
    }

    #[test]
    fn summary_serializes() {
        let mut ctx = StoryContext::new(NarrativeId(5), Mood::Whimsical, Genre::Fantasy, 4);
        ctx.introduce_character("the oracle");
        let json = serde_json::to_string(&ctx.summary()).unwrap();
        assert!(json.contains("\"mood\":\"whimsical\""));
        assert!(json.contains("the oracle"));
    }
}
