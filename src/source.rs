//! Consumed external interfaces: trust graph, chain state, and profiles.
//!
//! The finder only ever sees the typed records defined in [`crate::model`];
//! decoding of raw positional call results happens here, at the boundary.
//! Batch reads return per-entry results so a single failed address degrades
//! to "excluded" without poisoning the rest of the batch.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::address::Address;
use crate::error::SourceError;
use crate::model::{LenderCapacity, Profile, RelayConstraint};
use crate::rate::Rate;

/// Result map of a batched read: each entry may independently fail.
///
/// An address missing from the map entirely is treated the same as a failed
/// entry (excluded from the search).
pub type BatchMap<T> = HashMap<Address, Result<T, SourceError>>;

/// Supplies, for any address, the set of addresses extending trust to it.
#[async_trait]
pub trait TrustGraphSource: Send + Sync {
    /// Addresses with a direct or mutual trust relation pointing at
    /// `address`. An address with zero trusters yields an empty set, not an
    /// error; an `Err` means the source itself is unreachable.
    ///
    /// The set is ordered so that frontier expansion is deterministic.
    async fn trusters_of(&self, address: Address) -> Result<BTreeSet<Address>, SourceError>;
}

/// Batched reads of per-address on-chain lending state.
#[async_trait]
pub trait ChainStateReader: Send + Sync {
    /// Whether each address has the lending module enabled. Cheap; issued
    /// before any state read so disabled addresses are pruned early.
    async fn batch_check_module_enabled(
        &self,
        addresses: &[Address],
    ) -> Result<BatchMap<bool>, SourceError>;

    /// Lending limits and live balances for each address.
    async fn batch_read_capacity(
        &self,
        addresses: &[Address],
    ) -> Result<BatchMap<LenderCapacity>, SourceError>;

    /// Relay constraints for each address (for non-terminal candidates).
    async fn batch_read_relay_constraint(
        &self,
        addresses: &[Address],
    ) -> Result<BatchMap<RelayConstraint>, SourceError>;
}

/// Serves human-readable profile metadata for the enricher.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Profile for `address`, or `None` if the account never published one.
    async fn profile_of(&self, address: Address) -> Result<Option<Profile>, SourceError>;
}

// ---------------------------------------------------------------------------
// Positional tuple decoding
// ---------------------------------------------------------------------------

/// Decode the raw 6-word lender-state tuple returned by the lending module.
///
/// Word layout: `[lendingCap, minLendIR, lent, owedPerSecond, asOf,
/// liquidBalance]`. Implementations of [`ChainStateReader`] over a real RPC
/// transport route every capacity read through here so the finder never
/// handles positional data.
pub fn decode_capacity_words(
    address: Address,
    words: &[u128],
) -> Result<LenderCapacity, SourceError> {
    let [lending_cap, min_lend_ir, lent, owed_per_second, as_of, liquid_balance] = *words else {
        return Err(SourceError::Decode {
            address: address.to_string(),
            message: format!("expected 6 words of lender state, got {}", words.len()),
        });
    };
    let as_of = u64::try_from(as_of).map_err(|_| SourceError::Decode {
        address: address.to_string(),
        message: "snapshot timestamp exceeds u64".into(),
    })?;
    Ok(LenderCapacity {
        lending_cap,
        min_lend_ir: Rate::from_wad_per_second(min_lend_ir),
        lent,
        owed_per_second,
        as_of,
        liquid_balance,
    })
}

/// Decode the raw 2-word relay-constraint tuple: `[maxBorrowIR, minIRMargin]`.
pub fn decode_relay_words(
    address: Address,
    words: &[u128],
) -> Result<RelayConstraint, SourceError> {
    let [max_borrow_ir, min_ir_margin] = *words else {
        return Err(SourceError::Decode {
            address: address.to_string(),
            message: format!("expected 2 words of relay constraints, got {}", words.len()),
        });
    };
    Ok(RelayConstraint {
        max_borrow_ir: Rate::from_wad_per_second(max_borrow_ir),
        min_ir_margin: Rate::from_wad_per_second(min_ir_margin),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    #[test]
    fn decode_capacity_tuple() {
        let cap = decode_capacity_words(addr(1), &[1_000, 1_585_489_599, 10, 2, 500, 900]).unwrap();
        assert_eq!(cap.lending_cap, 1_000);
        assert_eq!(cap.min_lend_ir.wad_per_second(), 1_585_489_599);
        assert_eq!(cap.lent, 10);
        assert_eq!(cap.owed_per_second, 2);
        assert_eq!(cap.as_of, 500);
        assert_eq!(cap.liquid_balance, 900);
    }

    #[test]
    fn decode_capacity_rejects_short_tuple() {
        let err = decode_capacity_words(addr(1), &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
        assert!(format!("{err}").contains("got 3"));
    }

    #[test]
    fn decode_capacity_rejects_oversized_timestamp() {
        let err =
            decode_capacity_words(addr(1), &[1, 1, 1, 1, u128::from(u64::MAX) + 1, 1]).unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
    }

    #[test]
    fn decode_relay_tuple() {
        let rc = decode_relay_words(addr(2), &[700, 100]).unwrap();
        assert_eq!(rc.max_borrow_ir.wad_per_second(), 700);
        assert_eq!(rc.min_ir_margin.wad_per_second(), 100);
    }

    #[test]
    fn decode_relay_rejects_wrong_arity() {
        assert!(decode_relay_words(addr(2), &[1, 2, 3]).is_err());
    }
}
