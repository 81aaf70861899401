//! Shared test helpers for `quottery-sync-core` unit tests.
//!
//! Fixture builders for wire records and domain types, so that codec,
//! engine and store tests share a single source of truth for dummy bets.

use crate::codec::{RawBasicInfo, RawBetInfo, RawOracle};
use crate::identity::{IdentityCodec, QubicIdentityCodec};
use crate::types::{Bet, BetInfo, BetStatus, Oracle, PublicKey, QtryDateTime, NO_VOTE};

// ==============================================================================
// Key Helpers
// ==============================================================================

/// Deterministic non-zero public key from a single distinguishing byte.
pub fn key(b: u8) -> PublicKey {
    let mut bytes = [b; 32];
    bytes[0] = b.wrapping_add(1);
    bytes
}

pub fn identity(b: u8) -> String {
    QubicIdentityCodec.identity_for_pubkey(&key(b))
}

// ==============================================================================
// Wire Records
// ==============================================================================

/// Three options, three oracles (keys 101..=103), two of which voted.
/// Dates fall in the packed layout's representable range.
pub fn raw_bet_info(bet_id: u32) -> RawBetInfo {
    RawBetInfo {
        bet_id,
        no_options: 3,
        creator: key(100),
        description: format!("bet {bet_id}"),
        option_descriptions: vec!["yes".into(), "no".into(), "draw".into()],
        oracles: vec![
            RawOracle {
                pubkey: key(101),
                fee_percent: 1.25,
            },
            RawOracle {
                pubkey: key(102),
                fee_percent: 0.5,
            },
            RawOracle {
                pubkey: key(103),
                fee_percent: 2.0,
            },
        ],
        oracle_votes: vec![0, NO_VOTE, 1],
        open: QtryDateTime::new(2024, 6, 1, 8, 0, 0),
        close: QtryDateTime::new(2024, 6, 10, 12, 30, 15),
        end: QtryDateTime::new(2024, 6, 20, 18, 45, 30),
        amount_per_slot: 10_000,
        max_slots_per_option: 100,
        slot_state: vec![4, 0, 6],
    }
}

pub fn raw_basic_info() -> RawBasicInfo {
    RawBasicInfo {
        fee_per_slot_per_hour: 3,
        game_operator_fee: 0.5,
        shareholders_fee: 10.0,
        min_amount_per_slot: 10_000,
        burn_fee: 2.0,
        issued_bets: 12,
        money_flow: 1_000_000,
        money_flow_through_issue_bet: 400_000,
        money_flow_through_join_bet: 500_000,
        money_flow_through_finalize_bet: 100_000,
        shareholders_earned_amount: 9_000,
        shareholders_paid_amount: 8_000,
        winners_earned_amount: 70_000,
        distributed_amount: 60_000,
        burned_amount: 2_000,
        game_operator: key(50),
    }
}

// ==============================================================================
// Domain Types
// ==============================================================================

/// [`raw_bet_info`] with keys converted through the real identity codec.
pub fn bet_info(bet_id: u32) -> BetInfo {
    let raw = raw_bet_info(bet_id);
    let codec = QubicIdentityCodec;
    BetInfo {
        bet_id: raw.bet_id,
        no_options: raw.no_options,
        creator: codec.identity_for_pubkey(&raw.creator),
        description: raw.description,
        option_descriptions: raw.option_descriptions,
        oracles: raw
            .oracles
            .iter()
            .map(|o| Oracle {
                identity: codec.identity_for_pubkey(&o.pubkey),
                fee_percent: o.fee_percent,
            })
            .collect(),
        oracle_votes: raw.oracle_votes,
        open: raw.open,
        close: raw.close,
        end: raw.end,
        amount_per_slot: raw.amount_per_slot,
        max_slots_per_option: raw.max_slots_per_option,
        slot_state: raw.slot_state,
    }
}

/// An active, unresolved bet with derived fields matching [`bet_info`].
pub fn bet(bet_id: u32) -> Bet {
    Bet {
        info: bet_info(bet_id),
        result: -1,
        status: BetStatus::Active,
        current_total: 100_000,
        odds: vec![2.5, 10.0, 10.0 / 6.0],
    }
}
