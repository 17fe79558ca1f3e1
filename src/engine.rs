use crate::dedup::DedupCache;
use crate::filter::KeywordFilter;
use crate::message::StreamMessage;
use tracing::trace;

/// Admission gate: keyword match first, then the dedup cache.
///
/// Returns true iff the body matches `filter` and the id is not in `cache`.
/// Accepted ids are recorded so redeliveries are rejected until evicted.
pub fn accept(message: &StreamMessage, filter: &KeywordFilter, cache: &mut DedupCache) -> bool {
    evaluate(message, filter, cache) == Verdict::Accepted
}

fn evaluate(message: &StreamMessage, filter: &KeywordFilter, cache: &mut DedupCache) -> Verdict {
    if !filter.matches(&message.text) {
        return Verdict::NoMatch;
    }
    if cache.contains(&message.id) {
        return Verdict::Duplicate;
    }
    if let Some(evicted) = cache.insert(&message.id) {
        trace!(evicted = %evicted, "Dedup cache full, evicted oldest id");
    }
    Verdict::Accepted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    NoMatch,
    Duplicate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub accepted: u64,
    pub unmatched: u64,
    pub duplicates: u64,
}

/// Keyword filter plus dedup cache for one stream.
#[derive(Debug)]
pub struct FilterEngine {
    filter: KeywordFilter,
    cache: DedupCache,
    stats: EngineStats,
}

impl FilterEngine {
    pub fn new(filter: KeywordFilter, cache: DedupCache) -> Self {
        Self {
            filter,
            cache,
            stats: EngineStats::default(),
        }
    }

    pub fn evaluate(&mut self, message: &StreamMessage) -> Verdict {
        let verdict = evaluate(message, &self.filter, &mut self.cache);
        match verdict {
            Verdict::Accepted => self.stats.accepted += 1,
            Verdict::NoMatch => self.stats.unmatched += 1,
            Verdict::Duplicate => self.stats.duplicates += 1,
        }
        verdict
    }

    pub fn filter(&self) -> &KeywordFilter {
        &self.filter
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}
