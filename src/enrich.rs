//! Background profile enrichment for emitted paths.
//!
//! Enrichment never gates discovery: the consumer gets the bare path first
//! and a metadata update later, matched by path key. The per-address cache
//! lives on the enricher instance, which is created fresh for each search,
//! so repeated addresses across many paths cost one lookup each and nothing
//! leaks across searches.

use std::sync::Arc;

use dashmap::DashMap;

use crate::address::Address;
use crate::model::{EnrichedPath, HopProfile, LendingPath, Profile};
use crate::source::ProfileSource;

/// Attaches display names and avatars to discovered paths.
pub struct PathEnricher {
    profiles: Arc<dyn ProfileSource>,
    /// Address → resolved profile (or confirmed absence). Failed lookups are
    /// cached as absent too, so a flaky profile service is asked once.
    cache: DashMap<Address, Option<Profile>>,
}

impl PathEnricher {
    /// Create an enricher with an empty cache.
    pub fn new(profiles: Arc<dyn ProfileSource>) -> Self {
        Self {
            profiles,
            cache: DashMap::new(),
        }
    }

    /// Resolve profile metadata for every hop of `path`.
    ///
    /// Infallible by design: a failed lookup yields an absent name/avatar
    /// for that hop only, logged and swallowed.
    pub async fn enrich(&self, path: &LendingPath) -> EnrichedPath {
        let mut profiles = Vec::with_capacity(path.path.len());
        for &address in &path.path {
            let profile = self.lookup(address).await;
            profiles.push(HopProfile {
                address,
                name: profile.as_ref().and_then(|p| p.name.clone()),
                avatar_url: profile.as_ref().and_then(|p| p.avatar_url.clone()),
            });
        }
        EnrichedPath {
            path: path.clone(),
            profiles,
        }
    }

    /// Number of addresses with a cached resolution.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    async fn lookup(&self, address: Address) -> Option<Profile> {
        if let Some(hit) = self.cache.get(&address) {
            return hit.clone();
        }
        let resolved = match self.profiles.profile_of(address).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(address = %address.short(), %err, "profile lookup failed");
                None
            }
        };
        self.cache.insert(address, resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureNetwork;
    use crate::model::LenderCapacity;
    use crate::rate::Rate;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn path(addrs: Vec<Address>) -> LendingPath {
        let irs = vec![Rate::from_apr_bps(500); addrs.len() - 1];
        LendingPath {
            path: addrs,
            irs,
            source_available: 100,
        }
    }

    fn named_network() -> FixtureNetwork {
        let mut net = FixtureNetwork::new();
        let cap = LenderCapacity {
            lending_cap: 100,
            min_lend_ir: Rate::from_apr_bps(500),
            lent: 0,
            owed_per_second: 0,
            as_of: 0,
            liquid_balance: 100,
        };
        net.set_lender(addr(1), cap);
        net.set_profile(
            addr(1),
            Profile {
                name: Some("Alice".into()),
                avatar_url: Some("ipfs://alice".into()),
            },
        );
        net.set_lender(addr(2), cap);
        net
    }

    #[tokio::test]
    async fn attaches_profiles_per_hop() {
        let enricher = PathEnricher::new(Arc::new(named_network()));
        let enriched = enricher.enrich(&path(vec![addr(1), addr(2), addr(3)])).await;

        assert_eq!(enriched.profiles.len(), 3);
        assert_eq!(enriched.profiles[0].name.as_deref(), Some("Alice"));
        assert_eq!(enriched.profiles[0].avatar_url.as_deref(), Some("ipfs://alice"));
        // addr(2) has no published profile, addr(3) is unknown entirely.
        assert!(enriched.profiles[1].name.is_none());
        assert!(enriched.profiles[2].name.is_none());
        assert_eq!(enriched.source_name(), Some("Alice"));
    }

    #[tokio::test]
    async fn lookups_are_cached_per_address() {
        let enricher = PathEnricher::new(Arc::new(named_network()));
        enricher.enrich(&path(vec![addr(1), addr(2)])).await;
        assert_eq!(enricher.cached_len(), 2);
        // Re-enriching a path over the same addresses adds no entries.
        enricher.enrich(&path(vec![addr(1), addr(2)])).await;
        assert_eq!(enricher.cached_len(), 2);
    }

    #[tokio::test]
    async fn failed_lookup_degrades_one_hop_only() {
        let mut net = named_network();
        net.set_profile(
            addr(2),
            Profile {
                name: Some("Bob".into()),
                avatar_url: None,
            },
        );
        net.poison_profile(addr(1));
        let enricher = PathEnricher::new(Arc::new(net));
        let enriched = enricher.enrich(&path(vec![addr(1), addr(2)])).await;
        assert!(enriched.profiles[0].name.is_none());
        assert_eq!(enriched.profiles[1].name.as_deref(), Some("Bob"));
        // The failure is cached as absent.
        assert_eq!(enricher.cached_len(), 2);
    }
}
