//! Core data model: lender state snapshots, relay constraints, and the
//! lending paths the search emits.
//!
//! Everything here is transient, created fresh per search invocation. The
//! records are already typed; decoding from raw positional call results is
//! the job of the [`crate::source`] boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::rate::Rate;

/// Haircut applied to computed available capacity, in percent kept.
///
/// Absorbs rounding and interest-accrual drift between the snapshot block
/// and the eventual borrow transaction.
pub const SAFETY_FACTOR_PERCENT: u128 = 98;

/// Per-address snapshot of a lender's on-chain state.
///
/// Amounts are in token base units; `min_lend_ir` is a per-second wad rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderCapacity {
    /// Maximum principal this lender is willing to have outstanding.
    pub lending_cap: u128,
    /// Minimum acceptable lending rate.
    pub min_lend_ir: Rate,
    /// Principal currently owed to this lender, as of `as_of`.
    pub lent: u128,
    /// Interest accrual on `lent`, in token units per second.
    pub owed_per_second: u128,
    /// Block timestamp of this snapshot (seconds).
    pub as_of: u64,
    /// Spendable token balance.
    pub liquid_balance: u128,
}

impl LenderCapacity {
    /// Outstanding principal projected to `now`, including accrued interest.
    pub fn current_lent(&self, now: u64) -> u128 {
        let dt = now.saturating_sub(self.as_of) as u128;
        self.lent.saturating_add(self.owed_per_second.saturating_mul(dt))
    }

    /// Capacity-constrained principal obtainable from this lender at `now`.
    ///
    /// `min(lending_cap − current_lent, liquid_balance)` with the safety
    /// haircut applied. Zero if the lending cap is zero or exhausted.
    pub fn available(&self, now: u64) -> u128 {
        if self.lending_cap == 0 {
            return 0;
        }
        let headroom = self.lending_cap.saturating_sub(self.current_lent(now));
        let raw = headroom.min(self.liquid_balance);
        raw.saturating_mul(SAFETY_FACTOR_PERCENT) / 100
    }

    /// Whether this lender can act as a capacity source at `now`.
    pub fn is_usable(&self, now: u64) -> bool {
        self.available(now) > 0
    }
}

/// Constraints an address imposes when acting as an intermediate relayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConstraint {
    /// Ceiling on the rate this relayer will itself pay upstream.
    pub max_borrow_ir: Rate,
    /// Minimum spread required between the rate paid and the rate charged.
    pub min_ir_margin: Rate,
}

impl RelayConstraint {
    /// The highest upstream rate this relayer accepts, given the rate it
    /// charges downstream.
    ///
    /// Both the hard borrow ceiling and the margin requirement must hold, so
    /// the bound is the tighter of the two. `None` when the margin exceeds
    /// `own_rate`: no upstream rate, not even zero, leaves the required
    /// spread, so the relayer cannot extend any chain.
    pub fn max_upstream_rate(&self, own_rate: Rate) -> Option<Rate> {
        let headroom = own_rate.checked_minus(self.min_ir_margin)?;
        Some(self.max_borrow_ir.min(headroom))
    }
}

/// Canonical identity of a lending path: its ordered address sequence.
///
/// Two discoveries of the same chain via different expansion orders compare
/// equal and are deduplicated on this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(Vec<Address>);

impl PathKey {
    /// The addresses of the path, source first.
    pub fn addresses(&self) -> &[Address] {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, addr) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "→")?;
            }
            write!(f, "{}", addr.short())?;
        }
        Ok(())
    }
}

/// A validated chain of trust from a capacity source down to the borrower.
///
/// `path = [source, hop…, borrower]`; `irs[i]` is the rate `path[i]` charges
/// `path[i + 1]`, so `irs.len() == path.len() − 1` and the sequence is
/// non-decreasing from source to borrower (each relayer's outgoing rate is
/// at least its incoming rate plus its margin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPath {
    /// Ordered addresses, source first, borrower last.
    pub path: Vec<Address>,
    /// Per-edge interest rates, one per hop.
    pub irs: Vec<Rate>,
    /// The source's `available` capacity at discovery time. Not re-validated
    /// after emission.
    pub source_available: u128,
}

impl LendingPath {
    /// The capacity source at the head of the path.
    pub fn source(&self) -> Address {
        self.path[0]
    }

    /// The borrower at the tail of the path.
    pub fn borrower(&self) -> Address {
        *self.path.last().expect("path is never empty")
    }

    /// The rate the borrower ultimately pays (the last edge's rate).
    pub fn final_rate(&self) -> Rate {
        *self.irs.last().expect("irs is never empty")
    }

    /// Number of edges, i.e. 1 for a direct loan.
    pub fn hop_count(&self) -> usize {
        self.irs.len()
    }

    /// Canonical dedup key for this path.
    pub fn key(&self) -> PathKey {
        PathKey(self.path.clone())
    }
}

impl fmt::Display for LendingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} avail, {})", self.key(), self.source_available, self.final_rate())
    }
}

/// Human-readable metadata for one address, as served by the profile source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Display name, if the account published one.
    pub name: Option<String>,
    /// Avatar image reference.
    pub avatar_url: Option<String>,
}

/// Profile metadata attached to one hop of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopProfile {
    pub address: Address,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A lending path with per-hop profile metadata attached.
///
/// Consumers receive the unresolved form immediately on discovery and a
/// resolved update later, matched by [`PathKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedPath {
    /// The underlying discovered path.
    pub path: LendingPath,
    /// Per-hop metadata, aligned with `path.path`.
    pub profiles: Vec<HopProfile>,
}

impl EnrichedPath {
    /// Wrap a freshly discovered path with all metadata still unresolved.
    pub fn unresolved(path: LendingPath) -> Self {
        let profiles = path
            .path
            .iter()
            .map(|&address| HopProfile {
                address,
                name: None,
                avatar_url: None,
            })
            .collect();
        Self { path, profiles }
    }

    /// Display name of the source hop, if resolved.
    pub fn source_name(&self) -> Option<&str> {
        self.profiles.first().and_then(|p| p.name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn snapshot() -> LenderCapacity {
        LenderCapacity {
            lending_cap: 1_000,
            min_lend_ir: Rate::from_apr_bps(500),
            lent: 0,
            owed_per_second: 0,
            as_of: 100,
            liquid_balance: 1_000,
        }
    }

    #[test]
    fn available_applies_haircut() {
        let cap = snapshot();
        assert_eq!(cap.available(100), 980);
        assert!(cap.is_usable(100));
    }

    #[test]
    fn available_is_liquidity_bounded() {
        let cap = LenderCapacity {
            liquid_balance: 500,
            ..snapshot()
        };
        assert_eq!(cap.available(100), 490);
    }

    #[test]
    fn current_lent_accrues_interest() {
        let cap = LenderCapacity {
            lent: 100,
            owed_per_second: 2,
            ..snapshot()
        };
        assert_eq!(cap.current_lent(100), 100);
        assert_eq!(cap.current_lent(110), 120);
        // Clock going backwards relative to the snapshot accrues nothing.
        assert_eq!(cap.current_lent(50), 100);
    }

    #[test]
    fn accrual_erodes_available() {
        let cap = LenderCapacity {
            lent: 900,
            owed_per_second: 10,
            ..snapshot()
        };
        // headroom 100 at the snapshot instant, gone 10 seconds later.
        assert_eq!(cap.available(100), 98);
        assert_eq!(cap.available(110), 0);
        assert!(!cap.is_usable(110));
    }

    #[test]
    fn zero_cap_is_never_usable() {
        let cap = LenderCapacity {
            lending_cap: 0,
            ..snapshot()
        };
        assert_eq!(cap.available(100), 0);
        assert!(!cap.is_usable(100));
    }

    #[test]
    fn max_upstream_rate_takes_tighter_bound() {
        let own = Rate::from_wad_per_second(600);
        // Margin binds: 600 − 200 = 400 < ceiling 500.
        let rc = RelayConstraint {
            max_borrow_ir: Rate::from_wad_per_second(500),
            min_ir_margin: Rate::from_wad_per_second(200),
        };
        assert_eq!(rc.max_upstream_rate(own), Some(Rate::from_wad_per_second(400)));

        // Ceiling binds: 600 − 100 = 500 > ceiling 300.
        let rc = RelayConstraint {
            max_borrow_ir: Rate::from_wad_per_second(300),
            min_ir_margin: Rate::from_wad_per_second(100),
        };
        assert_eq!(rc.max_upstream_rate(own), Some(Rate::from_wad_per_second(300)));
    }

    #[test]
    fn margin_above_own_rate_has_no_upstream_bound() {
        let rc = RelayConstraint {
            max_borrow_ir: Rate::from_wad_per_second(500),
            min_ir_margin: Rate::from_wad_per_second(700),
        };
        // A 6-unit rate cannot leave a 7-unit spread for any upstream rate.
        assert_eq!(rc.max_upstream_rate(Rate::from_wad_per_second(600)), None);
        // Margin exactly equal to the rate admits only a free source.
        assert_eq!(
            rc.max_upstream_rate(Rate::from_wad_per_second(700)),
            Some(Rate::ZERO)
        );
    }

    #[test]
    fn path_key_equality_is_sequence_identity() {
        let p1 = LendingPath {
            path: vec![addr(1), addr(2), addr(3)],
            irs: vec![Rate::from_apr_bps(400), Rate::from_apr_bps(600)],
            source_available: 100,
        };
        let p2 = LendingPath {
            path: vec![addr(1), addr(2), addr(3)],
            irs: vec![Rate::from_apr_bps(300), Rate::from_apr_bps(700)],
            source_available: 999,
        };
        let p3 = LendingPath {
            path: vec![addr(1), addr(4), addr(3)],
            irs: p1.irs.clone(),
            source_available: 100,
        };
        assert_eq!(p1.key(), p2.key());
        assert_ne!(p1.key(), p3.key());
    }

    #[test]
    fn path_accessors() {
        let p = LendingPath {
            path: vec![addr(1), addr(2), addr(3)],
            irs: vec![Rate::from_apr_bps(400), Rate::from_apr_bps(600)],
            source_available: 100,
        };
        assert_eq!(p.source(), addr(1));
        assert_eq!(p.borrower(), addr(3));
        assert_eq!(p.final_rate(), Rate::from_apr_bps(600));
        assert_eq!(p.hop_count(), 2);
    }

    #[test]
    fn unresolved_enrichment_is_aligned() {
        let p = LendingPath {
            path: vec![addr(1), addr(2)],
            irs: vec![Rate::from_apr_bps(500)],
            source_available: 980,
        };
        let e = EnrichedPath::unresolved(p.clone());
        assert_eq!(e.profiles.len(), 2);
        assert_eq!(e.profiles[0].address, addr(1));
        assert!(e.source_name().is_none());
    }
}
