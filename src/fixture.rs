//! In-memory network fixtures.
//!
//! A [`FixtureNetwork`] implements all three source traits over data loaded
//! from a JSON file (or built programmatically in tests), so the whole
//! pipeline can run without a chain connection. Failure injection knobs
//! reproduce the degraded-read and unreachable-source cases.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;

use crate::address::Address;
use crate::error::{LendError, SourceError};
use crate::model::{LenderCapacity, Profile, RelayConstraint};
use crate::rate::Rate;
use crate::source::{BatchMap, ChainStateReader, ProfileSource, TrustGraphSource};

/// Everything the fixture knows about one participant.
#[derive(Debug, Clone)]
struct LenderRecord {
    enabled: bool,
    capacity: LenderCapacity,
    relay: Option<RelayConstraint>,
    profile: Option<Profile>,
}

/// Which reads the fixture should fail, for error-path tests.
#[derive(Debug, Default)]
struct Faults {
    trust_down: bool,
    chain_down: bool,
    bad_capacity: HashSet<Address>,
    bad_profiles: HashSet<Address>,
}

/// An in-memory trust network with lender state and profiles.
#[derive(Debug, Default)]
pub struct FixtureNetwork {
    /// trustee → set of trusters (addresses extending trust to the trustee).
    trusters: HashMap<Address, BTreeSet<Address>>,
    lenders: HashMap<Address, LenderRecord>,
    faults: RwLock<Faults>,
}

// ---------------------------------------------------------------------------
// JSON loading
// ---------------------------------------------------------------------------

/// On-disk shape of a fixture network.
///
/// Rates are written as annualized basis points for readability; they are
/// converted to per-second wad rates on load.
#[derive(Debug, Deserialize)]
struct NetworkSpec {
    /// trustee address → list of trusters.
    #[serde(default)]
    trust: HashMap<Address, Vec<Address>>,
    #[serde(default)]
    lenders: HashMap<Address, LenderSpec>,
}

#[derive(Debug, Deserialize)]
struct LenderSpec {
    #[serde(default = "default_enabled")]
    enabled: bool,
    lending_cap: u128,
    liquid_balance: u128,
    #[serde(default)]
    min_lend_apr_bps: u64,
    #[serde(default)]
    lent: u128,
    #[serde(default)]
    owed_per_second: u128,
    #[serde(default)]
    as_of: u64,
    #[serde(default)]
    relay: Option<RelaySpec>,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct RelaySpec {
    max_borrow_apr_bps: u64,
    min_margin_apr_bps: u64,
}

fn default_enabled() -> bool {
    true
}

impl FixtureNetwork {
    /// An empty network with no participants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a network from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, LendError> {
        let spec: NetworkSpec = serde_json::from_str(json).map_err(|e| SourceError::Transport {
            message: format!("invalid network JSON: {e}"),
        })?;

        let mut net = FixtureNetwork::new();
        for (trustee, trusters) in spec.trust {
            for truster in trusters {
                net.add_trust(truster, trustee);
            }
        }
        for (address, lender) in spec.lenders {
            let capacity = LenderCapacity {
                lending_cap: lender.lending_cap,
                min_lend_ir: Rate::from_apr_bps(lender.min_lend_apr_bps),
                lent: lender.lent,
                owed_per_second: lender.owed_per_second,
                as_of: lender.as_of,
                liquid_balance: lender.liquid_balance,
            };
            net.set_lender(address, capacity);
            if !lender.enabled {
                net.set_disabled(address);
            }
            if let Some(relay) = lender.relay {
                net.set_relay(
                    address,
                    RelayConstraint {
                        max_borrow_ir: Rate::from_apr_bps(relay.max_borrow_apr_bps),
                        min_ir_margin: Rate::from_apr_bps(relay.min_margin_apr_bps),
                    },
                );
            }
            if let Some(profile) = lender.profile {
                net.set_profile(address, profile);
            }
        }
        Ok(net)
    }

    /// Load a network from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, LendError> {
        let content = std::fs::read_to_string(path).map_err(|e| SourceError::Transport {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json(&content)
    }

    // -- construction ------------------------------------------------------

    /// Record that `truster` extends trust to `trustee`.
    pub fn add_trust(&mut self, truster: Address, trustee: Address) {
        self.trusters.entry(trustee).or_default().insert(truster);
    }

    /// Register `address` as a module-enabled lender with the given snapshot.
    pub fn set_lender(&mut self, address: Address, capacity: LenderCapacity) {
        self.lenders
            .entry(address)
            .and_modify(|r| r.capacity = capacity)
            .or_insert(LenderRecord {
                enabled: true,
                capacity,
                relay: None,
                profile: None,
            });
    }

    /// Attach relay constraints to a registered lender.
    pub fn set_relay(&mut self, address: Address, relay: RelayConstraint) {
        if let Some(record) = self.lenders.get_mut(&address) {
            record.relay = Some(relay);
        }
    }

    /// Attach a published profile to a registered lender.
    pub fn set_profile(&mut self, address: Address, profile: Profile) {
        if let Some(record) = self.lenders.get_mut(&address) {
            record.profile = Some(profile);
        }
    }

    /// Mark a registered lender as having the module disabled.
    pub fn set_disabled(&mut self, address: Address) {
        if let Some(record) = self.lenders.get_mut(&address) {
            record.enabled = false;
        }
    }

    // -- failure injection -------------------------------------------------

    /// Make all trust graph queries fail (source unreachable).
    pub fn poison_trust_source(&self) {
        self.faults.write().expect("faults lock poisoned").trust_down = true;
    }

    /// Make all chain state batches fail (reader unreachable).
    pub fn poison_chain_reader(&self) {
        self.faults.write().expect("faults lock poisoned").chain_down = true;
    }

    /// Make the capacity entry for one address fail within its batch.
    pub fn poison_capacity(&self, address: Address) {
        self.faults
            .write()
            .expect("faults lock poisoned")
            .bad_capacity
            .insert(address);
    }

    /// Make profile lookups for one address fail.
    pub fn poison_profile(&self, address: Address) {
        self.faults
            .write()
            .expect("faults lock poisoned")
            .bad_profiles
            .insert(address);
    }

    // -- stats (for the CLI) ----------------------------------------------

    /// Number of distinct trust edges.
    pub fn trust_edge_count(&self) -> usize {
        self.trusters.values().map(BTreeSet::len).sum()
    }

    /// Number of registered lenders, enabled or not.
    pub fn lender_count(&self) -> usize {
        self.lenders.len()
    }

    /// Number of lenders with the module enabled.
    pub fn enabled_count(&self) -> usize {
        self.lenders.values().filter(|r| r.enabled).count()
    }
}

fn unreachable_chain() -> SourceError {
    SourceError::Transport {
        message: "chain state reader unreachable".into(),
    }
}

#[async_trait]
impl TrustGraphSource for FixtureNetwork {
    async fn trusters_of(&self, address: Address) -> Result<BTreeSet<Address>, SourceError> {
        if self.faults.read().expect("faults lock poisoned").trust_down {
            return Err(SourceError::Transport {
                message: "trust graph source unreachable".into(),
            });
        }
        Ok(self.trusters.get(&address).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ChainStateReader for FixtureNetwork {
    async fn batch_check_module_enabled(
        &self,
        addresses: &[Address],
    ) -> Result<BatchMap<bool>, SourceError> {
        if self.faults.read().expect("faults lock poisoned").chain_down {
            return Err(unreachable_chain());
        }
        Ok(addresses
            .iter()
            .map(|&a| {
                let enabled = self.lenders.get(&a).map(|r| r.enabled).unwrap_or(false);
                (a, Ok(enabled))
            })
            .collect())
    }

    async fn batch_read_capacity(
        &self,
        addresses: &[Address],
    ) -> Result<BatchMap<LenderCapacity>, SourceError> {
        let faults = self.faults.read().expect("faults lock poisoned");
        if faults.chain_down {
            return Err(unreachable_chain());
        }
        Ok(addresses
            .iter()
            .filter_map(|&a| {
                if faults.bad_capacity.contains(&a) {
                    return Some((
                        a,
                        Err(SourceError::Lookup {
                            address: a.to_string(),
                            message: "capacity read reverted".into(),
                        }),
                    ));
                }
                self.lenders.get(&a).map(|r| (a, Ok(r.capacity)))
            })
            .collect())
    }

    async fn batch_read_relay_constraint(
        &self,
        addresses: &[Address],
    ) -> Result<BatchMap<RelayConstraint>, SourceError> {
        if self.faults.read().expect("faults lock poisoned").chain_down {
            return Err(unreachable_chain());
        }
        Ok(addresses
            .iter()
            .filter_map(|&a| {
                self.lenders
                    .get(&a)
                    .and_then(|r| r.relay)
                    .map(|relay| (a, Ok(relay)))
            })
            .collect())
    }
}

#[async_trait]
impl ProfileSource for FixtureNetwork {
    async fn profile_of(&self, address: Address) -> Result<Option<Profile>, SourceError> {
        let faults = self.faults.read().expect("faults lock poisoned");
        if faults.bad_profiles.contains(&address) {
            return Err(SourceError::Lookup {
                address: address.to_string(),
                message: "profile service error".into(),
            });
        }
        Ok(self.lenders.get(&address).and_then(|r| r.profile.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn capacity(cap: u128) -> LenderCapacity {
        LenderCapacity {
            lending_cap: cap,
            min_lend_ir: Rate::from_apr_bps(500),
            lent: 0,
            owed_per_second: 0,
            as_of: 0,
            liquid_balance: cap,
        }
    }

    #[tokio::test]
    async fn trusters_of_unknown_address_is_empty() {
        let net = FixtureNetwork::new();
        assert!(net.trusters_of(addr(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trust_edges_are_directional() {
        let mut net = FixtureNetwork::new();
        net.add_trust(addr(1), addr(2));
        assert!(net.trusters_of(addr(2)).await.unwrap().contains(&addr(1)));
        assert!(net.trusters_of(addr(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_address_reports_module_disabled() {
        let net = FixtureNetwork::new();
        let map = net.batch_check_module_enabled(&[addr(1)]).await.unwrap();
        assert!(matches!(map[&addr(1)], Ok(false)));
    }

    #[tokio::test]
    async fn poisoned_capacity_fails_only_its_entry() {
        let mut net = FixtureNetwork::new();
        net.set_lender(addr(1), capacity(100));
        net.set_lender(addr(2), capacity(200));
        net.poison_capacity(addr(1));

        let map = net.batch_read_capacity(&[addr(1), addr(2)]).await.unwrap();
        assert!(map[&addr(1)].is_err());
        assert!(map[&addr(2)].is_ok());
    }

    #[tokio::test]
    async fn poisoned_reader_fails_whole_batch() {
        let mut net = FixtureNetwork::new();
        net.set_lender(addr(1), capacity(100));
        net.poison_chain_reader();
        assert!(net.batch_read_capacity(&[addr(1)]).await.is_err());
    }

    #[tokio::test]
    async fn loads_network_from_json() {
        let json = r#"{
            "trust": {
                "0x0202020202020202020202020202020202020202":
                    ["0x0101010101010101010101010101010101010101"]
            },
            "lenders": {
                "0x0101010101010101010101010101010101010101": {
                    "lending_cap": 1000,
                    "liquid_balance": 1000,
                    "min_lend_apr_bps": 500,
                    "relay": { "max_borrow_apr_bps": 700, "min_margin_apr_bps": 100 },
                    "profile": { "name": "Alice", "avatar_url": null }
                }
            }
        }"#;
        let net = FixtureNetwork::from_json(json).unwrap();
        assert_eq!(net.trust_edge_count(), 1);
        assert_eq!(net.lender_count(), 1);
        assert_eq!(net.enabled_count(), 1);

        let alice = addr(1);
        let caps = net.batch_read_capacity(&[alice]).await.unwrap();
        assert_eq!(caps[&alice].as_ref().unwrap().lending_cap, 1000);
        let profile = net.profile_of(alice).await.unwrap().unwrap();
        assert_eq!(profile.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(FixtureNetwork::from_json("{ not json").is_err());
    }
}
