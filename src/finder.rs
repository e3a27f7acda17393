//! Depth-bounded streaming search for lending paths.
//!
//! Expands breadth-first outward from the borrower, one trust hop per depth.
//! Each depth costs a handful of batched network round-trips: one trust
//! lookup per frontier head, one module-enabled batch, then capacity and
//! relay-constraint batches issued concurrently. Paths are emitted through a
//! callback the moment their source's capacity is confirmed, never after a
//! full traversal.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future;

use crate::address::Address;
use crate::error::SearchError;
use crate::model::{LendingPath, PathKey};
use crate::rate::Rate;
use crate::source::{ChainStateReader, TrustGraphSource};

/// Cooperative cancellation flag for one search invocation.
///
/// The finder checks it before each depth and before each emission; results
/// of in-flight reads that resolve after cancellation are discarded, not
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon the search this token belongs to.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether the search has been abandoned.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A validated downstream chain awaiting deeper expansion.
///
/// `addrs = [head, …, borrower]`; `irs` holds one rate per edge. The head
/// has already passed the margin rule for everything below it, so extending
/// the chain only needs to check the head's own upstream bound.
#[derive(Debug, Clone)]
struct RelayChain {
    addrs: Vec<Address>,
    irs: Vec<Rate>,
    /// Highest rate the head will pay upstream. `None` for the borrower's
    /// pseudo-chain at depth 0 (the borrower accepts any offered rate).
    max_upstream: Option<Rate>,
}

impl RelayChain {
    fn head(&self) -> Address {
        self.addrs[0]
    }

    fn extend(&self, candidate: Address, rate: Rate, max_upstream: Option<Rate>) -> RelayChain {
        let mut addrs = Vec::with_capacity(self.addrs.len() + 1);
        addrs.push(candidate);
        addrs.extend_from_slice(&self.addrs);
        let mut irs = Vec::with_capacity(self.irs.len() + 1);
        irs.push(rate);
        irs.extend_from_slice(&self.irs);
        RelayChain {
            addrs,
            irs,
            max_upstream,
        }
    }
}

/// Discovers lending paths by walking the trust graph against live chain
/// state.
///
/// Owns no search state itself; every [`find_paths`](Self::find_paths)
/// invocation gets a fresh frontier and dedup set.
pub struct PathFinder {
    trust: Arc<dyn TrustGraphSource>,
    chain: Arc<dyn ChainStateReader>,
}

impl PathFinder {
    /// Create a finder over the given trust graph and chain state sources.
    pub fn new(trust: Arc<dyn TrustGraphSource>, chain: Arc<dyn ChainStateReader>) -> Self {
        Self { trust, chain }
    }

    /// Search for lending paths terminating at `borrower`.
    ///
    /// Explores up to `max_depth` trust hops outward. `on_path` fires exactly
    /// once per distinct [`PathKey`], in discovery order, as soon as the
    /// path's source capacity is confirmed; `on_depth(d)` fires when depth
    /// `d` begins, starting at 0. Resolves with `Ok(())` when no further
    /// depth can be searched, the bound is reached, or the token is
    /// cancelled.
    ///
    /// Failed entries within a batch exclude only the affected addresses; a
    /// wholly unreachable source fails the search with
    /// [`SearchError::UpstreamUnavailable`].
    pub async fn find_paths<P, D>(
        &self,
        borrower: Address,
        max_depth: usize,
        cancel: &CancelToken,
        mut on_path: P,
        mut on_depth: D,
    ) -> Result<(), SearchError>
    where
        P: FnMut(LendingPath),
        D: FnMut(usize),
    {
        if borrower.is_zero() {
            return Err(SearchError::InvalidBorrower {
                reason: "the zero address cannot borrow".into(),
            });
        }
        if max_depth == 0 {
            return Err(SearchError::InvalidDepth { max_depth });
        }

        tracing::info!(borrower = %borrower.short(), max_depth, "starting path search");

        // Shallowest-path-wins: every address that enters a depth's candidate
        // set is recorded here and never re-enters a deeper frontier.
        let mut seen: HashSet<Address> = HashSet::from([borrower]);
        let mut emitted: HashSet<PathKey> = HashSet::new();
        let mut chains = vec![RelayChain {
            addrs: vec![borrower],
            irs: Vec::new(),
            max_upstream: None,
        }];

        for depth in 0..max_depth {
            if cancel.is_cancelled() {
                tracing::debug!(depth, "search cancelled");
                return Ok(());
            }
            on_depth(depth);

            // One trust lookup per distinct frontier head, in flight together.
            let heads: Vec<Address> = chains
                .iter()
                .map(RelayChain::head)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let lookups =
                future::join_all(heads.iter().map(|&h| self.trust.trusters_of(h))).await;
            if cancel.is_cancelled() {
                return Ok(());
            }
            let mut trusters: HashMap<Address, BTreeSet<Address>> = HashMap::new();
            for (&head, result) in heads.iter().zip(lookups) {
                match result {
                    Ok(set) => {
                        trusters.insert(head, set);
                    }
                    Err(source) => {
                        return Err(SearchError::UpstreamUnavailable { source });
                    }
                }
            }

            // Frontier: trusters of each head, minus addresses reachable at a
            // shallower depth and minus anything already in that chain (cycle
            // guard, including the borrower itself).
            let per_chain: Vec<Vec<Address>> = chains
                .iter()
                .map(|chain| {
                    trusters[&chain.head()]
                        .iter()
                        .copied()
                        .filter(|a| !seen.contains(a) && !chain.addrs.contains(a))
                        .collect()
                })
                .collect();
            let candidates: BTreeSet<Address> = per_chain.iter().flatten().copied().collect();
            if candidates.is_empty() {
                tracing::debug!(depth, "frontier exhausted");
                break;
            }
            seen.extend(candidates.iter().copied());
            let candidate_list: Vec<Address> = candidates.into_iter().collect();
            tracing::debug!(depth, frontier = candidate_list.len(), "evaluating depth");

            // Cheap qualification first: module-enabled status for the whole
            // frontier in one batch, pruning before any state read.
            let enabled = self
                .chain
                .batch_check_module_enabled(&candidate_list)
                .await
                .map_err(|source| SearchError::UpstreamUnavailable { source })?;
            let qualified: Vec<Address> = candidate_list
                .iter()
                .copied()
                .filter(|a| match enabled.get(a) {
                    Some(Ok(true)) => true,
                    Some(Ok(false)) => false,
                    Some(Err(err)) => {
                        tracing::warn!(address = %a.short(), %err, "module check failed, excluding");
                        false
                    }
                    None => {
                        tracing::warn!(address = %a.short(), "module check missing, excluding");
                        false
                    }
                })
                .collect();
            if qualified.is_empty() {
                tracing::debug!(depth, "no qualified candidates");
                break;
            }

            // State reads for the qualified frontier. The relay batch is only
            // needed if another depth will expand from these candidates.
            let will_expand = depth + 1 < max_depth;
            let (capacities, relays) = if will_expand {
                let (caps, relays) = tokio::join!(
                    self.chain.batch_read_capacity(&qualified),
                    self.chain.batch_read_relay_constraint(&qualified),
                );
                (caps, relays)
            } else {
                (
                    self.chain.batch_read_capacity(&qualified).await,
                    Ok(HashMap::new()),
                )
            };
            let capacities =
                capacities.map_err(|source| SearchError::UpstreamUnavailable { source })?;
            let relays = relays.map_err(|source| SearchError::UpstreamUnavailable { source })?;
            if cancel.is_cancelled() {
                return Ok(());
            }

            let now = unix_now();
            let qualified: HashSet<Address> = qualified.into_iter().collect();
            let mut next_chains: Vec<RelayChain> = Vec::new();

            for (chain, chain_candidates) in chains.iter().zip(&per_chain) {
                for &candidate in chain_candidates {
                    if !qualified.contains(&candidate) {
                        continue;
                    }
                    let capacity = match capacities.get(&candidate) {
                        Some(Ok(capacity)) => *capacity,
                        Some(Err(err)) => {
                            tracing::warn!(
                                address = %candidate.short(),
                                %err,
                                "capacity read failed, excluding"
                            );
                            continue;
                        }
                        None => {
                            tracing::warn!(
                                address = %candidate.short(),
                                "capacity missing from batch, excluding"
                            );
                            continue;
                        }
                    };

                    // The rate this candidate charges the chain head must
                    // clear the head's upstream bound (borrow ceiling and
                    // margin requirement, folded into one number).
                    let rate = capacity.min_lend_ir;
                    if !chain.max_upstream.is_none_or(|max| rate <= max) {
                        continue;
                    }

                    if capacity.is_usable(now) {
                        let path = LendingPath {
                            path: {
                                let mut addrs = Vec::with_capacity(chain.addrs.len() + 1);
                                addrs.push(candidate);
                                addrs.extend_from_slice(&chain.addrs);
                                addrs
                            },
                            irs: {
                                let mut irs = Vec::with_capacity(chain.irs.len() + 1);
                                irs.push(rate);
                                irs.extend_from_slice(&chain.irs);
                                irs
                            },
                            source_available: capacity.available(now),
                        };
                        if emitted.insert(path.key()) {
                            if cancel.is_cancelled() {
                                return Ok(());
                            }
                            tracing::debug!(path = %path, depth, "confirmed lending path");
                            on_path(path);
                        }
                    }

                    // A candidate that could profitably relay stays in the
                    // frontier, carrying its own upstream bound. Spare
                    // capacity is not required to relay.
                    if will_expand {
                        match relays.get(&candidate) {
                            Some(Ok(constraint)) => {
                                match constraint.max_upstream_rate(rate) {
                                    Some(bound) => {
                                        next_chains.push(chain.extend(
                                            candidate,
                                            rate,
                                            Some(bound),
                                        ));
                                    }
                                    // Required margin exceeds the rate this
                                    // candidate charges: no upstream rate can
                                    // satisfy it.
                                    None => {
                                        tracing::debug!(
                                            address = %candidate.short(),
                                            "margin exceeds own rate, not expanding"
                                        );
                                    }
                                }
                            }
                            Some(Err(err)) => {
                                tracing::warn!(
                                    address = %candidate.short(),
                                    %err,
                                    "relay constraint read failed, not expanding"
                                );
                            }
                            // No relay constraint configured: terminal only.
                            None => {}
                        }
                    }
                }
            }

            chains = next_chains;
            if chains.is_empty() {
                tracing::debug!(depth, "no relayable frontier left");
                break;
            }
        }

        tracing::info!(
            borrower = %borrower.short(),
            paths = emitted.len(),
            "path search complete"
        );
        Ok(())
    }
}

/// Wall-clock seconds since the UNIX epoch.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
