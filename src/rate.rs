//! Interest-rate arithmetic.
//!
//! Rates are carried internally the way the lending module stores them: as
//! per-second rates in 1e18 fixed point ("wad"). Annualized percentages only
//! exist at the display boundary. All arithmetic is integer and saturating,
//! so a malformed on-chain value can never panic the search.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-point scale for rates: 1.0 == 1e18.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Seconds in a (365-day) year, for APR conversion.
pub const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;

/// A per-second interest rate in 1e18 fixed point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Rate(pub u128);

impl Rate {
    /// The zero rate.
    pub const ZERO: Rate = Rate(0);

    /// Construct from a raw per-second wad value, as read from chain state.
    pub const fn from_wad_per_second(raw: u128) -> Self {
        Rate(raw)
    }

    /// Construct from an annualized rate in basis points (100 bps = 1% APR).
    ///
    /// Exact integer arithmetic; used by fixtures and tests.
    pub const fn from_apr_bps(bps: u64) -> Self {
        // bps/10_000 per year, scaled to wad per second.
        Rate(bps as u128 * (WAD / 10_000) / SECONDS_PER_YEAR)
    }

    /// The raw per-second wad value.
    pub const fn wad_per_second(self) -> u128 {
        self.0
    }

    /// Annualized percentage, for display only.
    pub fn apr_percent(self) -> f64 {
        self.0 as f64 / WAD as f64 * SECONDS_PER_YEAR as f64 * 100.0
    }

    /// The spread earned by a relayer paying `upstream` and charging `self`.
    ///
    /// Zero if the relayer would pay more than it charges.
    pub fn margin_over(self, upstream: Rate) -> Rate {
        Rate(self.0.saturating_sub(upstream.0))
    }

    /// Subtract a required margin. `None` if the margin exceeds the rate,
    /// which callers must treat as infeasible rather than a zero bound.
    pub fn checked_minus(self, margin: Rate) -> Option<Rate> {
        self.0.checked_sub(margin.0).map(Rate)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}% APR", self.apr_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bps_roundtrip_to_apr_percent() {
        let five_percent = Rate::from_apr_bps(500);
        let apr = five_percent.apr_percent();
        assert!((apr - 5.0).abs() < 0.01, "got {apr}");
    }

    #[test]
    fn zero_rate() {
        assert_eq!(Rate::ZERO.wad_per_second(), 0);
        assert_eq!(Rate::from_apr_bps(0), Rate::ZERO);
    }

    #[test]
    fn rates_order_by_magnitude() {
        assert!(Rate::from_apr_bps(400) < Rate::from_apr_bps(600));
    }

    #[test]
    fn margin_over_saturates() {
        let low = Rate::from_wad_per_second(400);
        let high = Rate::from_wad_per_second(600);
        assert_eq!(high.margin_over(low), Rate::from_wad_per_second(200));
        assert_eq!(low.margin_over(high), Rate::ZERO);
    }

    #[test]
    fn checked_minus_distinguishes_zero_from_infeasible() {
        let one = Rate::from_wad_per_second(100);
        let three = Rate::from_wad_per_second(300);
        assert_eq!(three.checked_minus(one), Some(Rate::from_wad_per_second(200)));
        assert_eq!(three.checked_minus(three), Some(Rate::ZERO));
        assert_eq!(one.checked_minus(three), None);
    }

    #[test]
    fn display_shows_apr() {
        let s = Rate::from_apr_bps(500).to_string();
        assert!(s.contains('%'), "got {s}");
    }
}
