use std::collections::BTreeMap;

use crate::error::DecodeError;
use crate::types::{PublicKey, QtryDateTime, MAX_OPTIONS, NO_VOTE};

use super::bytes::{
    array, ensure_len, from_centi, i8_at, is_zero, key_at, put_bytes, put_i8, put_text, put_u32,
    put_u64, text_at, to_centi, u32_at, u64_at,
};
use super::datetime::{decode_date, encode_date};
use super::layout::{
    basic_info as bi, bet_info as b, KEY_SIZE, MAX_BETTORS_PER_OPTION, OPTION_SLOTS,
    ORACLE_SLOTS, TEXT_SIZE,
};
use super::WireLayout;

// ==============================================================================
// Basic Info
// ==============================================================================

/// `GetBasicInfo` output before the operator key is turned into an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBasicInfo {
    pub fee_per_slot_per_hour: u64,
    pub game_operator_fee: f64,
    pub shareholders_fee: f64,
    pub min_amount_per_slot: u64,
    pub burn_fee: f64,
    pub issued_bets: u64,
    pub money_flow: u64,
    pub money_flow_through_issue_bet: u64,
    pub money_flow_through_join_bet: u64,
    pub money_flow_through_finalize_bet: u64,
    pub shareholders_earned_amount: u64,
    pub shareholders_paid_amount: u64,
    pub winners_earned_amount: u64,
    pub distributed_amount: u64,
    pub burned_amount: u64,
    pub game_operator: PublicKey,
}

pub fn decode_basic_info(buf: &[u8]) -> Result<RawBasicInfo, DecodeError> {
    ensure_len("basic info", buf, bi::SIZE)?;
    Ok(RawBasicInfo {
        fee_per_slot_per_hour: u64_at(buf, bi::FEE_PER_SLOT_PER_HOUR),
        game_operator_fee: from_centi(u64_at(buf, bi::GAME_OPERATOR_FEE)),
        shareholders_fee: from_centi(u64_at(buf, bi::SHAREHOLDER_FEE)),
        min_amount_per_slot: u64_at(buf, bi::MIN_BET_SLOT_AMOUNT),
        burn_fee: from_centi(u64_at(buf, bi::BURN_FEE)),
        issued_bets: u64_at(buf, bi::ISSUED_BETS),
        money_flow: u64_at(buf, bi::MONEY_FLOW),
        money_flow_through_issue_bet: u64_at(buf, bi::MONEY_FLOW_ISSUE_BET),
        money_flow_through_join_bet: u64_at(buf, bi::MONEY_FLOW_JOIN_BET),
        money_flow_through_finalize_bet: u64_at(buf, bi::MONEY_FLOW_FINALIZE_BET),
        shareholders_earned_amount: u64_at(buf, bi::EARNED_FOR_SHAREHOLDER),
        shareholders_paid_amount: u64_at(buf, bi::PAID_FOR_SHAREHOLDER),
        winners_earned_amount: u64_at(buf, bi::EARNED_FOR_WINNER),
        distributed_amount: u64_at(buf, bi::DISTRIBUTED),
        burned_amount: u64_at(buf, bi::BURNED),
        game_operator: key_at(buf, bi::GAME_OPERATOR),
    })
}

pub fn encode_basic_info(info: &RawBasicInfo) -> Vec<u8> {
    let mut buf = vec![0u8; bi::SIZE];
    put_u64(&mut buf, bi::FEE_PER_SLOT_PER_HOUR, info.fee_per_slot_per_hour);
    put_u64(&mut buf, bi::GAME_OPERATOR_FEE, to_centi(info.game_operator_fee));
    put_u64(&mut buf, bi::SHAREHOLDER_FEE, to_centi(info.shareholders_fee));
    put_u64(&mut buf, bi::MIN_BET_SLOT_AMOUNT, info.min_amount_per_slot);
    put_u64(&mut buf, bi::BURN_FEE, to_centi(info.burn_fee));
    put_u64(&mut buf, bi::ISSUED_BETS, info.issued_bets);
    put_u64(&mut buf, bi::MONEY_FLOW, info.money_flow);
    put_u64(&mut buf, bi::MONEY_FLOW_ISSUE_BET, info.money_flow_through_issue_bet);
    put_u64(&mut buf, bi::MONEY_FLOW_JOIN_BET, info.money_flow_through_join_bet);
    put_u64(&mut buf, bi::MONEY_FLOW_FINALIZE_BET, info.money_flow_through_finalize_bet);
    put_u64(&mut buf, bi::EARNED_FOR_SHAREHOLDER, info.shareholders_earned_amount);
    put_u64(&mut buf, bi::PAID_FOR_SHAREHOLDER, info.shareholders_paid_amount);
    put_u64(&mut buf, bi::EARNED_FOR_WINNER, info.winners_earned_amount);
    put_u64(&mut buf, bi::DISTRIBUTED, info.distributed_amount);
    put_u64(&mut buf, bi::BURNED, info.burned_amount);
    put_bytes(&mut buf, bi::GAME_OPERATOR, &info.game_operator);
    buf
}

// ==============================================================================
// Bet Info
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RawOracle {
    pub pubkey: PublicKey,
    pub fee_percent: f64,
}

/// `GetBetInfo` output before keys are turned into identities.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBetInfo {
    pub bet_id: u32,
    pub no_options: u32,
    pub creator: PublicKey,
    pub description: String,
    /// Non-empty descriptions only, in slot order.
    pub option_descriptions: Vec<String>,
    /// Configured oracles only; unused (all-zero) slots are skipped.
    pub oracles: Vec<RawOracle>,
    /// Aligned with `oracles`.
    pub oracle_votes: Vec<i8>,
    pub open: QtryDateTime,
    pub close: QtryDateTime,
    pub end: QtryDateTime,
    pub amount_per_slot: u64,
    pub max_slots_per_option: u32,
    /// Length `no_options`.
    pub slot_state: Vec<u32>,
}

pub fn decode_bet_info(layout: WireLayout, buf: &[u8]) -> Result<RawBetInfo, DecodeError> {
    ensure_len("bet info", buf, b::SIZE)?;

    let no_options = u32_at(buf, b::NO_OPTIONS);
    if no_options == 0 || no_options as usize > MAX_OPTIONS {
        return Err(DecodeError::OptionCount(no_options));
    }

    let option_descriptions = (0..OPTION_SLOTS)
        .map(|i| text_at(buf, b::OPTION_DESCRIPTIONS + i * TEXT_SIZE))
        .filter(|text| !text.is_empty())
        .collect();

    let oracles: Vec<RawOracle> = (0..ORACLE_SLOTS)
        .filter_map(|i| {
            let pubkey = key_at(buf, b::ORACLE_IDS + i * KEY_SIZE);
            if is_zero(&pubkey) {
                return None;
            }
            let fee = u32_at(buf, b::ORACLE_FEES + i * 4);
            Some(RawOracle {
                pubkey,
                fee_percent: from_centi(u64::from(fee)),
            })
        })
        .collect();

    let mut oracle_votes = vec![NO_VOTE; oracles.len()];
    for i in 0..ORACLE_SLOTS {
        let option = i8_at(buf, b::VOTE_OPTION + i);
        let operator = i8_at(buf, b::VOTE_OPERATOR + i);
        if option < 0 || operator < 0 {
            continue;
        }
        let slot = oracle_votes
            .get_mut(operator as usize)
            .ok_or(DecodeError::VoteOperator {
                operator,
                configured: oracles.len(),
            })?;
        if option as u32 >= no_options {
            return Err(DecodeError::VoteOption { option, no_options });
        }
        *slot = option;
    }

    let slot_state = (0..no_options as usize)
        .map(|i| u32_at(buf, b::SLOT_STATE + i * 4))
        .collect();

    Ok(RawBetInfo {
        bet_id: u32_at(buf, b::BET_ID),
        no_options,
        creator: key_at(buf, b::CREATOR),
        description: text_at(buf, b::DESCRIPTION),
        option_descriptions,
        oracles,
        oracle_votes,
        open: decode_date(layout, array(buf, b::OPEN)),
        close: decode_date(layout, array(buf, b::CLOSE)),
        end: decode_date(layout, array(buf, b::END)),
        amount_per_slot: u64_at(buf, b::AMOUNT_PER_SLOT),
        max_slots_per_option: u32_at(buf, b::MAX_SLOTS_PER_OPTION),
        slot_state,
    })
}

/// Lays `info` out the way the node does. Collections longer than their
/// slot count are truncated to the first eight entries.
pub fn encode_bet_info(layout: WireLayout, info: &RawBetInfo) -> Vec<u8> {
    let mut buf = vec![0u8; b::SIZE];
    put_u32(&mut buf, b::BET_ID, info.bet_id);
    put_u32(&mut buf, b::NO_OPTIONS, info.no_options);
    put_bytes(&mut buf, b::CREATOR, &info.creator);
    put_text(&mut buf, b::DESCRIPTION, &info.description);

    for (i, text) in info.option_descriptions.iter().take(OPTION_SLOTS).enumerate() {
        put_text(&mut buf, b::OPTION_DESCRIPTIONS + i * TEXT_SIZE, text);
    }
    for (i, oracle) in info.oracles.iter().take(ORACLE_SLOTS).enumerate() {
        put_bytes(&mut buf, b::ORACLE_IDS + i * KEY_SIZE, &oracle.pubkey);
        put_u32(
            &mut buf,
            b::ORACLE_FEES + i * 4,
            to_centi(oracle.fee_percent) as u32,
        );
    }

    put_bytes(&mut buf, b::OPEN, &encode_date(layout, &info.open));
    put_bytes(&mut buf, b::CLOSE, &encode_date(layout, &info.close));
    put_bytes(&mut buf, b::END, &encode_date(layout, &info.end));
    put_u64(&mut buf, b::AMOUNT_PER_SLOT, info.amount_per_slot);
    put_u32(&mut buf, b::MAX_SLOTS_PER_OPTION, info.max_slots_per_option);
    for (i, filled) in info.slot_state.iter().take(OPTION_SLOTS).enumerate() {
        put_u32(&mut buf, b::SLOT_STATE + i * 4, *filled);
    }

    for i in 0..ORACLE_SLOTS {
        put_i8(&mut buf, b::VOTE_OPTION + i, NO_VOTE);
        put_i8(&mut buf, b::VOTE_OPERATOR + i, NO_VOTE);
    }
    let cast = info
        .oracle_votes
        .iter()
        .take(ORACLE_SLOTS)
        .enumerate()
        .filter(|(_, vote)| **vote >= 0);
    for (entry, (operator, vote)) in cast.enumerate() {
        put_i8(&mut buf, b::VOTE_OPTION + entry, *vote);
        put_i8(&mut buf, b::VOTE_OPERATOR + entry, operator as i8);
    }

    buf
}

// ==============================================================================
// Active Bets
// ==============================================================================

/// `u32 count` followed by `count` u32 ids.
pub fn decode_active_bet_ids(buf: &[u8]) -> Result<Vec<u32>, DecodeError> {
    ensure_len("active bet list", buf, 4)?;
    let count = u32_at(buf, 0) as usize;
    let needed = count
        .checked_mul(4)
        .and_then(|n| n.checked_add(4))
        .unwrap_or(usize::MAX);
    ensure_len("active bet list", buf, needed)?;
    Ok((0..count).map(|i| u32_at(buf, 4 + i * 4)).collect())
}

pub fn encode_active_bet_ids(ids: &[u32]) -> Vec<u8> {
    let mut buf = vec![0u8; 4 + ids.len() * 4];
    put_u32(&mut buf, 0, ids.len() as u32);
    for (i, id) in ids.iter().enumerate() {
        put_u32(&mut buf, 4 + i * 4, *id);
    }
    buf
}

// ==============================================================================
// Option Detail
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOptionDetail {
    /// Entirely zero (or empty) response: the node has nothing recorded.
    NoData,
    /// Bettor key → number of slots (one per occurrence).
    Bettors(BTreeMap<PublicKey, u32>),
}

/// Decodes a run of 32-byte bettor keys. All-zero keys mark unused slots
/// and are skipped. Anything past the node's 1024-bettor array (such as a
/// trailing slot-count table) and a trailing partial block are ignored.
pub fn decode_option_detail(buf: &[u8]) -> RawOptionDetail {
    if is_zero(buf) {
        return RawOptionDetail::NoData;
    }

    let keys_len = buf.len().min(MAX_BETTORS_PER_OPTION * KEY_SIZE);
    let mut bettors = BTreeMap::new();
    for chunk in buf[..keys_len].chunks_exact(KEY_SIZE) {
        if is_zero(chunk) {
            continue;
        }
        let key: PublicKey = array(chunk, 0);
        *bettors.entry(key).or_insert(0) += 1;
    }
    RawOptionDetail::Bettors(bettors)
}
