/// Merge engine: the registry of merge requests and their one-shot resolution.
///
/// Every request starts `Pending` and leaves that state exactly once. The
/// pending check, the status write and the target mutation all happen under
/// the registry lock, so two racing resolutions of one request cannot both
/// succeed.

use parking_lot::Mutex;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::core::catalog::{MergeTone, TemplateCatalog};
use crate::core::composer::SegmentComposer;
use crate::core::config::StoryConfig;
use crate::core::context::{StoryContext, StoryEvent};
use crate::core::evolver::ContextEvolver;
use crate::schema::merge::{MergeDecision, MergeRequest, MergeRequestId, MergeStatus};
use crate::schema::segment::{NarrativeId, Segment};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("merge request not found: {0}")]
    RequestNotFound(MergeRequestId),
    #[error("merge request {id} was already resolved ({status:?})")]
    AlreadyResolved {
        id: MergeRequestId,
        status: MergeStatus,
    },
    #[error("{0} cannot merge with itself")]
    SelfMergeNotAllowed(NarrativeId),
    #[error("{0} has concluded and cannot take a merged segment")]
    TargetConcluded(NarrativeId),
    #[error("merge request {id} is for {expected}, but {actual} was supplied")]
    NarrativeMismatch {
        id: MergeRequestId,
        expected: NarrativeId,
        actual: NarrativeId,
    },
}

/// Result of resolving a request. `segment` is set only on acceptance and
/// belongs to the target narrative.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub request: MergeRequest,
    pub segment: Option<Segment>,
}

#[derive(Debug)]
pub struct MergeEngine {
    requests: Mutex<FxHashMap<MergeRequestId, MergeRequest>>,
    next_id: AtomicU64,
    tension_bump: f64,
    max_story_length: usize,
    composer: SegmentComposer,
    evolver: ContextEvolver,
}

impl MergeEngine {
    pub fn new(config: &StoryConfig) -> Self {
        Self {
            requests: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            tension_bump: config.merge_tension_bump,
            max_story_length: config.max_story_length,
            composer: SegmentComposer::new(config),
            evolver: ContextEvolver::new(config),
        }
    }

    /// Open a pending request to merge `source_segment` into `target`.
    pub fn request(
        &self,
        source: &StoryContext,
        target: &StoryContext,
        source_segment: &Segment,
    ) -> MergeRequest {
        let id = MergeRequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = MergeRequest {
            id,
            source: source.id(),
            target: target.id(),
            source_segment: source_segment.clone(),
            status: MergeStatus::Pending,
        };
        tracing::info!(request = %id, source = %request.source, target = %request.target, "Merge requested");
        self.requests.lock().insert(id, request.clone());
        request
    }

    pub fn get(&self, id: MergeRequestId) -> Option<MergeRequest> {
        self.requests.lock().get(&id).cloned()
    }

    /// Pending requests addressed to `target`, oldest first.
    pub fn pending_for(&self, target: NarrativeId) -> Vec<MergeRequest> {
        let mut pending: Vec<MergeRequest> = self
            .requests
            .lock()
            .values()
            .filter(|r| r.target == target && r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.id);
        pending
    }

    /// Resolve a pending request.
    ///
    /// On acceptance the target absorbs the source's characters, locations
    /// and themes, takes a tension bump, and gains a merged segment. The
    /// source context is only read. Any error leaves both contexts and the
    /// request untouched.
    ///
    /// A concluded target cannot accept: `TargetConcluded` is returned and
    /// the request stays pending, to be rejected or expired by the host.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        id: MergeRequestId,
        decision: MergeDecision,
        source: &StoryContext,
        target: &mut StoryContext,
        catalog: &TemplateCatalog,
        rng: &mut R,
    ) -> Result<MergeOutcome, MergeError> {
        let mut requests = self.requests.lock();
        let request = Self::pending(&mut requests, id)?;

        for (expected, actual) in [(request.source, source.id()), (request.target, target.id())] {
            if expected != actual {
                return Err(MergeError::NarrativeMismatch {
                    id,
                    expected,
                    actual,
                });
            }
        }

        if decision == MergeDecision::Accept && target.is_concluded() {
            return Err(MergeError::TargetConcluded(target.id()));
        }

        request.status = decision.status();
        let segment = match decision {
            MergeDecision::Accept => Some(self.apply(request, source, target, catalog, rng)),
            MergeDecision::Reject => None,
        };

        tracing::info!(
            request = %id,
            source = %request.source,
            target = %request.target,
            status = ?request.status,
            "Merge resolved"
        );

        Ok(MergeOutcome {
            request: request.clone(),
            segment,
        })
    }

    /// Reject a pending request without touching either story.
    pub fn reject(&self, id: MergeRequestId) -> Result<MergeRequest, MergeError> {
        self.close(id, MergeStatus::Rejected)
    }

    /// Expire a pending request. When and why requests expire is up to the host.
    pub fn expire(&self, id: MergeRequestId) -> Result<MergeRequest, MergeError> {
        self.close(id, MergeStatus::Expired)
    }

    /// Expire every pending request that involves `narrative`, as when its
    /// session ends. Returns the expired IDs.
    pub fn expire_involving(&self, narrative: NarrativeId) -> Vec<MergeRequestId> {
        let mut requests = self.requests.lock();
        let mut expired: Vec<MergeRequestId> = requests
            .values_mut()
            .filter(|r| r.is_pending() && (r.source == narrative || r.target == narrative))
            .map(|r| {
                r.status = MergeStatus::Expired;
                r.id
            })
            .collect();
        expired.sort();
        if !expired.is_empty() {
            tracing::debug!(narrative = %narrative, count = expired.len(), "Expired merge requests");
        }
        expired
    }

    /// Drop all requests that are no longer pending. Returns how many were removed.
    pub fn prune_resolved(&self) -> usize {
        let mut requests = self.requests.lock();
        let before = requests.len();
        requests.retain(|_, r| r.is_pending());
        before - requests.len()
    }

    /// Drop the terminal requests that involve `narrative`. Pending ones stay.
    pub fn prune_involving(&self, narrative: NarrativeId) -> usize {
        let mut requests = self.requests.lock();
        let before = requests.len();
        requests.retain(|_, r| r.is_pending() || (r.source != narrative && r.target != narrative));
        before - requests.len()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn close(&self, id: MergeRequestId, status: MergeStatus) -> Result<MergeRequest, MergeError> {
        let mut requests = self.requests.lock();
        let request = Self::pending(&mut requests, id)?;
        request.status = status;
        tracing::info!(request = %id, status = ?status, "Merge closed");
        Ok(request.clone())
    }

    /// Look up a request that can still be resolved.
    fn pending(
        requests: &mut FxHashMap<MergeRequestId, MergeRequest>,
        id: MergeRequestId,
    ) -> Result<&mut MergeRequest, MergeError> {
        let request = requests.get_mut(&id).ok_or(MergeError::RequestNotFound(id))?;
        if request.status.is_terminal() {
            return Err(MergeError::AlreadyResolved {
                id,
                status: request.status,
            });
        }
        if request.source == request.target {
            return Err(MergeError::SelfMergeNotAllowed(request.source));
        }
        Ok(request)
    }

    fn apply<R: Rng + ?Sized>(
        &self,
        request: &MergeRequest,
        source: &StoryContext,
        target: &mut StoryContext,
        catalog: &TemplateCatalog,
        rng: &mut R,
    ) -> Segment {
        let tone = MergeTone::between((source.mood, source.genre), (target.mood, target.genre));
        let composition =
            self.composer
                .compose_merge(&request.source_segment.content, tone, catalog, rng);

        target.absorb_elements(source);
        self.evolver.bump(target, self.tension_bump);
        target.record_event(StoryEvent::Merge);
        self.evolver.record_words(target, composition.word_count);
        if target.length() >= self.max_story_length {
            target.conclude();
        }

        Segment::merged(
            target.id(),
            target.take_sequence_number(),
            composition.content,
            request.source_segment.reference(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::story::{Genre, Mood};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        engine: MergeEngine,
        catalog: TemplateCatalog,
        a: StoryContext,
        b: StoryContext,
        b_latest: Segment,
        rng: StdRng,
    }

    fn fixture() -> Fixture {
        let config = StoryConfig::default();
        let mut a = StoryContext::new(NarrativeId(1), Mood::Mysterious, Genre::Fantasy, 8);
        let mut b = StoryContext::new(NarrativeId(2), Mood::Dark, Genre::Horror, 8);
        a.introduce_character("Elena");
        b.introduce_character("Magnus");
        let b_latest = Segment::new(NarrativeId(2), 3, "Magnus lit the last candle.".to_string());
        Fixture {
            engine: MergeEngine::new(&config),
            catalog: TemplateCatalog::builtin().unwrap(),
            a,
            b,
            b_latest,
            rng: StdRng::seed_from_u64(4),
        }
    }

    #[test]
    fn accept_merges_into_target() {
        let mut f = fixture();
        let req = f.engine.request(&f.b, &f.a, &f.b_latest);
        assert_eq!(req.status, MergeStatus::Pending);

        let outcome = f
            .engine
            .resolve(req.id, MergeDecision::Accept, &f.b, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap();

        assert_eq!(outcome.request.status, MergeStatus::Accepted);
        let characters: Vec<&str> = f.a.characters().iter().map(String::as_str).collect();
        assert_eq!(characters, vec!["Elena", "Magnus"]);
        assert_eq!(f.b.characters().len(), 1);

        let segment = outcome.segment.unwrap();
        assert!(segment.is_merged);
        assert_eq!(segment.narrative, NarrativeId(1));
        assert_eq!(segment.merged_from, Some(f.b_latest.reference()));
        assert!(segment.content.ends_with("Magnus lit the last candle."));
        assert!((f.a.tension() - StoryConfig::default().merge_tension_bump).abs() < 1e-12);
        assert_eq!(f.a.recent_events().last(), Some(&StoryEvent::Merge));
        assert_eq!(f.a.length(), segment.word_count());
    }

    #[test]
    fn reject_leaves_contexts_unchanged() {
        let mut f = fixture();
        let req = f.engine.request(&f.b, &f.a, &f.b_latest);
        let before = f.a.clone();
        let outcome = f
            .engine
            .resolve(req.id, MergeDecision::Reject, &f.b, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap();
        assert_eq!(outcome.request.status, MergeStatus::Rejected);
        assert!(outcome.segment.is_none());
        assert_eq!(f.a, before);
    }

    #[test]
    fn second_resolution_fails() {
        let mut f = fixture();
        let req = f.engine.request(&f.b, &f.a, &f.b_latest);
        f.engine
            .resolve(req.id, MergeDecision::Accept, &f.b, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap();
        let snapshot = (f.a.clone(), f.b.clone());

        for decision in [MergeDecision::Accept, MergeDecision::Reject] {
            let err = f
                .engine
                .resolve(req.id, decision, &f.b, &mut f.a, &f.catalog, &mut f.rng)
                .unwrap_err();
            assert_eq!(
                err,
                MergeError::AlreadyResolved {
                    id: req.id,
                    status: MergeStatus::Accepted
                }
            );
        }
        assert_eq!((f.a.clone(), f.b.clone()), snapshot);
        assert!(f.engine.expire(req.id).is_err());
    }

    #[test]
    fn unknown_request_not_found() {
        let mut f = fixture();
        let err = f
            .engine
            .resolve(MergeRequestId(999), MergeDecision::Accept, &f.b, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap_err();
        assert_eq!(err, MergeError::RequestNotFound(MergeRequestId(999)));
    }

    #[test]
    fn self_merge_rejected() {
        let mut f = fixture();
        let own = Segment::new(NarrativeId(1), 0, "Elena waited.".to_string());
        let req = f.engine.request(&f.a, &f.a, &own);
        let source = f.a.clone();
        let err = f
            .engine
            .resolve(req.id, MergeDecision::Accept, &source, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap_err();
        assert_eq!(err, MergeError::SelfMergeNotAllowed(NarrativeId(1)));
        assert_eq!(f.a, source);
        assert!(f.engine.get(req.id).unwrap().is_pending());
    }

    #[test]
    fn concluded_target_refuses_accept() {
        let mut f = fixture();
        f.a.conclude();
        let req = f.engine.request(&f.b, &f.a, &f.b_latest);
        let before = f.a.clone();

        let err = f
            .engine
            .resolve(req.id, MergeDecision::Accept, &f.b, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap_err();
        assert_eq!(err, MergeError::TargetConcluded(NarrativeId(1)));
        assert_eq!(f.a, before);
        assert!(f.engine.get(req.id).unwrap().is_pending());

        let outcome = f
            .engine
            .resolve(req.id, MergeDecision::Reject, &f.b, &mut f.a, &f.catalog, &mut f.rng)
            .unwrap();
        assert_eq!(outcome.request.status, MergeStatus::Rejected);
        assert_eq!(f.a, before);
    }

    #[test]
    fn mismatched_contexts_rejected() {
        let mut f = fixture();
        let req = f.engine.request(&f.b, &f.a, &f.b_latest);
        let mut stranger = StoryContext::new(NarrativeId(7), Mood::Dark, Genre::Horror, 8);
        let err = f
            .engine
            .resolve(req.id, MergeDecision::Accept, &f.b, &mut stranger, &f.catalog, &mut f.rng)
            .unwrap_err();
        assert!(matches!(err, MergeError::NarrativeMismatch { expected: NarrativeId(1), .. }));
        assert!(f.engine.get(req.id).unwrap().is_pending());
        assert!(stranger.characters().is_empty());
    }

    #[test]
    fn expiry_and_pruning() {
        let f = fixture();
        let first = f.engine.request(&f.b, &f.a, &f.b_latest);
        let second = f.engine.request(&f.b, &f.a, &f.b_latest);
        assert_eq!(f.engine.pending_for(NarrativeId(1)).len(), 2);
        assert!(f.engine.pending_for(NarrativeId(2)).is_empty());

        assert_eq!(f.engine.expire(first.id).unwrap().status, MergeStatus::Expired);
        assert_eq!(f.engine.expire_involving(NarrativeId(2)), vec![second.id]);
        assert!(f.engine.pending_for(NarrativeId(1)).is_empty());

        assert_eq!(f.engine.prune_resolved(), 2);
        assert!(f.engine.is_empty());
    }

    #[test]
    fn pruning_one_narrative_keeps_the_rest() {
        let f = fixture();
        let c = StoryContext::new(NarrativeId(3), Mood::Romantic, Genre::Romance, 8);
        let closed = f.engine.request(&f.b, &f.a, &f.b_latest);
        let open = f.engine.request(&f.b, &f.a, &f.b_latest);
        let elsewhere = f.engine.request(&c, &f.a, &f.b_latest);
        f.engine.reject(closed.id).unwrap();
        f.engine.expire(elsewhere.id).unwrap();

        assert_eq!(f.engine.prune_involving(NarrativeId(2)), 1);
        assert!(f.engine.get(closed.id).is_none());
        assert!(f.engine.get(open.id).unwrap().is_pending());
        assert!(f.engine.get(elsewhere.id).is_some());
    }

    #[test]
    fn concurrent_resolution_succeeds_once() {
        use std::sync::Arc;

        let f = fixture();
        let engine = Arc::new(f.engine);
        let catalog = Arc::new(f.catalog);
        let req = engine.request(&f.b, &f.a, &f.b_latest);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let catalog = Arc::clone(&catalog);
                let source = f.b.clone();
                let mut target = f.a.clone();
                std::thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(i);
                    engine
                        .resolve(req.id, MergeDecision::Accept, &source, &mut target, &catalog, &mut rng)
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }
}
