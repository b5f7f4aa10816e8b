/// Narrative store: the bounded set of live narratives a host serves.
///
/// Each narrative owns its context, its random source and its latest
/// segment behind its own lock, so one narrative's steps are serialized
/// while different narratives proceed in parallel. Narratives live from
/// `start` until the host calls `end`.

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::core::context::{ContextSummary, StoryContext};
use crate::core::engine::{narrative_rng, Continuation, EngineError, StoryEngine};
use crate::core::merge::{MergeError, MergeOutcome};
use crate::schema::interaction::Interaction;
use crate::schema::merge::{MergeDecision, MergeRequest, MergeRequestId};
use crate::schema::segment::{NarrativeId, Segment};
use crate::schema::story::{Genre, Mood};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("narrative not found: {0}")]
    NarrativeNotFound(NarrativeId),
    #[error("store is full ({0} live narratives)")]
    StoreFull(usize),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<MergeError> for StoreError {
    fn from(err: MergeError) -> Self {
        StoreError::Engine(EngineError::Merge(err))
    }
}

/// One live narrative.
#[derive(Debug)]
pub struct Narrative {
    context: StoryContext,
    rng: StdRng,
    latest: Segment,
}

impl Narrative {
    pub fn context(&self) -> &StoryContext {
        &self.context
    }

    pub fn latest(&self) -> &Segment {
        &self.latest
    }
}

type Slot = Arc<Mutex<Narrative>>;

pub struct NarrativeStore {
    engine: Arc<StoryEngine>,
    narratives: RwLock<FxHashMap<NarrativeId, Slot>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl NarrativeStore {
    pub fn new(engine: Arc<StoryEngine>) -> Self {
        let capacity = engine.config().store_capacity;
        Self {
            engine,
            narratives: RwLock::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            capacity,
        }
    }

    pub fn engine(&self) -> &StoryEngine {
        &self.engine
    }

    /// Start a narrative and return its ID with the opening segment.
    pub fn start(
        &self,
        seed: Option<u64>,
        genre: Option<Genre>,
        mood: Option<Mood>,
    ) -> Result<(NarrativeId, Segment), StoreError> {
        let mut narratives = self.narratives.write();
        if narratives.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "Narrative store full");
            return Err(StoreError::StoreFull(self.capacity));
        }

        let id = NarrativeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut rng = narrative_rng(seed);
        let (context, opening) = self.engine.start_narrative(id, genre, mood, &mut rng);
        narratives.insert(
            id,
            Arc::new(Mutex::new(Narrative {
                context,
                rng,
                latest: opening.clone(),
            })),
        );
        Ok((id, opening))
    }

    pub fn continue_narrative(&self, id: NarrativeId, interaction: &Interaction) -> Result<Continuation, StoreError> {
        self.with(id, |n| {
            let continuation = self.engine.continue_narrative(&mut n.context, interaction, &mut n.rng);
            if let Continuation::Segment(ref segment) = continuation {
                n.latest = segment.clone();
            }
            Ok(continuation)
        })
    }

    pub fn set_mood(&self, id: NarrativeId, mood: &str) -> Result<(), StoreError> {
        self.with(id, |n| Ok(self.engine.set_mood(&mut n.context, mood)?))
    }

    pub fn set_genre(&self, id: NarrativeId, genre: &str) -> Result<(), StoreError> {
        self.with(id, |n| Ok(self.engine.set_genre(&mut n.context, genre)?))
    }

    pub fn restart(&self, id: NarrativeId) -> Result<Segment, StoreError> {
        self.with(id, |n| {
            let opening = self.engine.restart_narrative(&mut n.context, &mut n.rng);
            n.latest = opening.clone();
            Ok(opening)
        })
    }

    pub fn summary(&self, id: NarrativeId) -> Result<ContextSummary, StoreError> {
        self.with(id, |n| Ok(n.context.summary()))
    }

    /// A copy of the narrative's current context.
    pub fn context(&self, id: NarrativeId) -> Result<StoryContext, StoreError> {
        self.with(id, |n| Ok(n.context.clone()))
    }

    pub fn latest_segment(&self, id: NarrativeId) -> Result<Segment, StoreError> {
        self.with(id, |n| Ok(n.latest.clone()))
    }

    /// Evict a narrative. Pending merge requests that involve it are expired
    /// and then dropped from the registry along with its other closed ones.
    pub fn end(&self, id: NarrativeId) -> Result<ContextSummary, StoreError> {
        let slot = self
            .narratives
            .write()
            .remove(&id)
            .ok_or(StoreError::NarrativeNotFound(id))?;
        let merges = self.engine.merges();
        merges.expire_involving(id);
        let dropped = merges.prune_involving(id);
        let summary = slot.lock().context.summary();
        tracing::info!(narrative = %id, length = summary.length, dropped_requests = dropped, "Narrative ended");
        Ok(summary)
    }

    /// Ask to merge the source's latest segment into the target.
    pub fn request_merge(&self, source: NarrativeId, target: NarrativeId) -> Result<MergeRequest, StoreError> {
        // Snapshot one side at a time; source and target may be the same slot
        let (source_ctx, latest) = self.with(source, |n| Ok((n.context.clone(), n.latest.clone())))?;
        let target_ctx = self.context(target)?;
        Ok(self.engine.request_merge(&source_ctx, &target_ctx, &latest))
    }

    /// Resolve a merge request against the live narratives. The target's
    /// random source drives the merged segment.
    pub fn resolve_merge(&self, id: MergeRequestId, decision: MergeDecision) -> Result<MergeOutcome, StoreError> {
        let request = self
            .engine
            .merges()
            .get(id)
            .ok_or(MergeError::RequestNotFound(id))?;
        if !request.is_pending() {
            return Err(MergeError::AlreadyResolved {
                id,
                status: request.status,
            }
            .into());
        }

        let target_slot = self.slot(request.target)?;
        if request.source == request.target {
            let mut target = target_slot.lock();
            let source = target.context.clone();
            return self.resolve_locked(id, decision, &source, &mut target);
        }

        // Lock in ID order so opposing merges cannot deadlock
        let source_slot = self.slot(request.source)?;
        let (source, mut target) = if request.source < request.target {
            let source = source_slot.lock();
            (source, target_slot.lock())
        } else {
            let target = target_slot.lock();
            (source_slot.lock(), target)
        };
        self.resolve_locked(id, decision, &source.context, &mut target)
    }

    pub fn pending_merges(&self, target: NarrativeId) -> Vec<MergeRequest> {
        self.engine.pending_merges(target)
    }

    pub fn len(&self) -> usize {
        self.narratives.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NarrativeId) -> bool {
        self.narratives.read().contains_key(&id)
    }

    /// IDs of all live narratives, ascending.
    pub fn ids(&self) -> Vec<NarrativeId> {
        let mut ids: Vec<NarrativeId> = self.narratives.read().keys().copied().collect();
        ids.sort();
        ids
    }

    fn resolve_locked(
        &self,
        id: MergeRequestId,
        decision: MergeDecision,
        source: &StoryContext,
        target: &mut Narrative,
    ) -> Result<MergeOutcome, StoreError> {
        let outcome = self
            .engine
            .resolve_merge(id, decision, source, &mut target.context, &mut target.rng)?;
        if let Some(ref segment) = outcome.segment {
            target.latest = segment.clone();
        }
        Ok(outcome)
    }

    fn slot(&self, id: NarrativeId) -> Result<Slot, StoreError> {
        self.narratives
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NarrativeNotFound(id))
    }

    fn with<T>(&self, id: NarrativeId, f: impl FnOnce(&mut Narrative) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let slot = self.slot(id)?;
        let mut narrative = slot.lock();
        f(&mut *narrative)
    }
}
