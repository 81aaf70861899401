//! Derived bet fields.
//!
//! Everything here is recomputed from a freshly decoded [`BetInfo`] on every
//! cycle; nothing depends on what the store held before.

use time::OffsetDateTime;

use crate::consensus;
use crate::types::{Bet, BetInfo, BetStatus};

// ==============================================================================
// Totals and Odds
// ==============================================================================

/// Total slots taken across all options.
#[must_use]
pub fn total_selected(info: &BetInfo) -> u64 {
    info.slot_state.iter().map(|&s| u64::from(s)).sum()
}

/// Amount locked in the bet so far. Saturates instead of wrapping on
/// absurd node values.
#[must_use]
pub fn current_total(info: &BetInfo) -> u64 {
    total_selected(info).saturating_mul(info.amount_per_slot)
}

/// Payout multiplier per option: `total / slots[i]`. An option nobody has
/// picked yet shows the whole pool as its multiplier, and an empty bet
/// shows `1` everywhere.
#[must_use]
pub fn compute_odds(slot_state: &[u32]) -> Vec<f64> {
    let total: u64 = slot_state.iter().map(|&s| u64::from(s)).sum();
    if total == 0 {
        return vec![1.0; slot_state.len()];
    }
    let total = total as f64;
    slot_state
        .iter()
        .map(|&slots| {
            if slots > 0 {
                total / f64::from(slots)
            } else {
                total
            }
        })
        .collect()
}

// ==============================================================================
// Status
// ==============================================================================

/// A bet is closed once it has a result, or once its end date has passed
/// without one. An end date that is not a real calendar instant never
/// expires the bet on its own.
#[must_use]
pub fn bet_status(info: &BetInfo, result: i32, now: OffsetDateTime) -> BetStatus {
    if result >= 0 {
        return BetStatus::Inactive;
    }
    match info.end.to_utc() {
        Some(end) if now > end => BetStatus::Inactive,
        _ => BetStatus::Active,
    }
}

/// Resolve consensus and fill in every derived field.
#[must_use]
pub fn enrich(info: BetInfo, now: OffsetDateTime) -> Bet {
    let result = consensus::resolve(&info.oracle_votes).result;
    let status = bet_status(&info, result, now);
    Bet {
        current_total: current_total(&info),
        odds: compute_odds(&info.slot_state),
        result,
        status,
        info,
    }
}
