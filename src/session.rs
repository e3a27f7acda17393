//! Search orchestration: streaming, dedup, enrichment merge, supersession.
//!
//! One [`SearchSession`] outlives many searches, but every search invocation
//! gets its own state: a fresh path map, a fresh enrichment cache, and a
//! fresh cancellation token. Starting a new search cancels the previous one;
//! an abandoned search emits no further events.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;

use crate::address::Address;
use crate::enrich::PathEnricher;
use crate::error::SearchError;
use crate::finder::{CancelToken, PathFinder};
use crate::model::{EnrichedPath, PathKey};
use crate::source::{ChainStateReader, ProfileSource, TrustGraphSource};

/// Events streamed to the consumer over one search's lifetime.
///
/// `Discovered` arrives with unresolved profiles the moment a path is
/// confirmed; a matching `Enriched` (same path key) follows whenever the
/// profile lookups finish, possibly after `Finished`. The stream ends when
/// discovery and all enrichment work are done.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// Evaluation of trust-hop depth `d` has begun.
    Depth(usize),
    /// A new path was confirmed; profile metadata not yet resolved.
    Discovered(EnrichedPath),
    /// Profile metadata for a previously discovered path resolved.
    Enriched(EnrichedPath),
    /// Discovery exhausted the depth bound or the frontier.
    Finished,
    /// Discovery hit a fatal error; no more paths will arrive.
    Failed(Arc<SearchError>),
}

/// Snapshot handle for one search invocation.
pub struct SearchHandle {
    token: CancelToken,
    paths: Arc<DashMap<PathKey, EnrichedPath>>,
    events: mpsc::UnboundedReceiver<SearchEvent>,
}

impl SearchHandle {
    /// Receive the next event; `None` once the search and all enrichment
    /// tasks have wound down (or the search was superseded).
    pub async fn next_event(&mut self) -> Option<SearchEvent> {
        self.events.recv().await
    }

    /// Abandon this search.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Latest known version of every discovered path (enriched where
    /// enrichment has landed), in no particular order.
    pub fn paths(&self) -> Vec<EnrichedPath> {
        self.paths.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Latest known version of one path.
    pub fn path(&self, key: &PathKey) -> Option<EnrichedPath> {
        self.paths.get(key).map(|entry| entry.value().clone())
    }
}

/// Runs searches over a fixed set of data sources, superseding the previous
/// search whenever a new one starts.
pub struct SearchSession {
    trust: Arc<dyn TrustGraphSource>,
    chain: Arc<dyn ChainStateReader>,
    profiles: Arc<dyn ProfileSource>,
    active: Mutex<Option<CancelToken>>,
}

impl SearchSession {
    /// Create a session over the given sources.
    pub fn new(
        trust: Arc<dyn TrustGraphSource>,
        chain: Arc<dyn ChainStateReader>,
        profiles: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            trust,
            chain,
            profiles,
            active: Mutex::new(None),
        }
    }

    /// Start a search for `borrower`, cancelling any search still in flight.
    ///
    /// Argument validation happens inside the spawned search; bad arguments
    /// surface as a [`SearchEvent::Failed`] on the returned handle.
    pub fn start(&self, borrower: Address, max_depth: usize) -> SearchHandle {
        let token = CancelToken::new();
        {
            let mut active = self.active.lock().expect("active-search lock poisoned");
            if let Some(previous) = active.replace(token.clone()) {
                tracing::debug!("superseding in-flight search");
                previous.cancel();
            }
        }

        let (tx, events) = mpsc::unbounded_channel();
        // Doubles as the dedup set: a key present here was already emitted.
        let paths: Arc<DashMap<PathKey, EnrichedPath>> = Arc::new(DashMap::new());

        let finder = PathFinder::new(Arc::clone(&self.trust), Arc::clone(&self.chain));
        let enricher = Arc::new(PathEnricher::new(Arc::clone(&self.profiles)));

        let task_token = token.clone();
        let task_paths = Arc::clone(&paths);
        tokio::spawn(async move {
            let path_tx = tx.clone();
            let depth_tx = tx.clone();
            let emit_token = task_token.clone();
            let emit_paths = Arc::clone(&task_paths);

            let result = finder
                .find_paths(
                    borrower,
                    max_depth,
                    &task_token,
                    |path| {
                        let key = path.key();
                        let unresolved = EnrichedPath::unresolved(path.clone());
                        match emit_paths.entry(key.clone()) {
                            Entry::Occupied(_) => {
                                // Same chain reached via another expansion
                                // order; drop silently.
                                tracing::debug!(%key, "duplicate path key dropped");
                                return;
                            }
                            Entry::Vacant(slot) => {
                                slot.insert(unresolved.clone());
                            }
                        }
                        if emit_token.is_cancelled() {
                            return;
                        }
                        let _ = path_tx.send(SearchEvent::Discovered(unresolved));

                        let enricher = Arc::clone(&enricher);
                        let paths = Arc::clone(&emit_paths);
                        let enrich_tx = path_tx.clone();
                        let enrich_token = emit_token.clone();
                        tokio::spawn(async move {
                            let enriched = enricher.enrich(&path).await;
                            if enrich_token.is_cancelled() {
                                return;
                            }
                            // Merge into the existing entry; the path data
                            // itself is never replaced by enrichment.
                            if let Some(mut entry) = paths.get_mut(&key) {
                                entry.profiles = enriched.profiles.clone();
                            }
                            let _ = enrich_tx.send(SearchEvent::Enriched(enriched));
                        });
                    },
                    |depth| {
                        let _ = depth_tx.send(SearchEvent::Depth(depth));
                    },
                )
                .await;

            match result {
                Ok(()) => {
                    if !task_token.is_cancelled() {
                        let _ = tx.send(SearchEvent::Finished);
                    }
                }
                Err(err) => {
                    tracing::error!(%err, "path search failed");
                    if !task_token.is_cancelled() {
                        let _ = tx.send(SearchEvent::Failed(Arc::new(err)));
                    }
                }
            }
        });

        SearchHandle {
            token,
            paths,
            events,
        }
    }
}
