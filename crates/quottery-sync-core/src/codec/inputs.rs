//! Encoders for request inputs: the two query inputs the engine sends, plus
//! the issue/join transaction inputs. The latter are never sent by this
//! service but share the record layout rules, so they live here.

use crate::types::QtryDateTime;

use super::bytes::{put_bytes, put_text, put_u32, put_u64, to_centi};
use super::datetime::encode_date;
use super::layout::{issue_bet as ib, join_bet as jb, KEY_SIZE, OPTION_SLOTS, ORACLE_SLOTS, TEXT_SIZE};
use super::records::RawOracle;
use super::WireLayout;

/// `GetBetInfo` input.
pub fn encode_bet_id_request(bet_id: u32) -> Vec<u8> {
    bet_id.to_le_bytes().to_vec()
}

/// `GetBetOptionDetail` input: `bet_id u32, option u32`.
pub fn encode_option_detail_request(bet_id: u32, option: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    put_u32(&mut buf, 0, bet_id);
    put_u32(&mut buf, 4, option);
    buf
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueBet {
    pub description: String,
    pub option_descriptions: Vec<String>,
    pub oracles: Vec<RawOracle>,
    pub close: QtryDateTime,
    pub end: QtryDateTime,
    pub amount_per_slot: u64,
    pub max_slots_per_option: u32,
    pub no_options: u32,
}

pub fn encode_issue_bet(layout: WireLayout, bet: &IssueBet) -> Vec<u8> {
    let mut buf = vec![0u8; ib::SIZE];
    put_text(&mut buf, ib::DESCRIPTION, &bet.description);
    for (i, text) in bet.option_descriptions.iter().take(OPTION_SLOTS).enumerate() {
        put_text(&mut buf, ib::OPTION_DESCRIPTIONS + i * TEXT_SIZE, text);
    }
    for (i, oracle) in bet.oracles.iter().take(ORACLE_SLOTS).enumerate() {
        put_bytes(&mut buf, ib::ORACLE_IDS + i * KEY_SIZE, &oracle.pubkey);
        put_u32(
            &mut buf,
            ib::ORACLE_FEES + i * 4,
            to_centi(oracle.fee_percent) as u32,
        );
    }
    put_bytes(&mut buf, ib::CLOSE, &encode_date(layout, &bet.close));
    put_bytes(&mut buf, ib::END, &encode_date(layout, &bet.end));
    put_u64(&mut buf, ib::AMOUNT_PER_SLOT, bet.amount_per_slot);
    put_u32(&mut buf, ib::MAX_SLOTS_PER_OPTION, bet.max_slots_per_option);
    put_u32(&mut buf, ib::NO_OPTIONS, bet.no_options);
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinBet {
    pub bet_id: u32,
    pub slots: i32,
    pub option: u32,
}

pub fn encode_join_bet(join: &JoinBet) -> Vec<u8> {
    let mut buf = vec![0u8; jb::SIZE];
    put_u32(&mut buf, jb::BET_ID, join.bet_id);
    put_bytes(&mut buf, jb::SLOTS, &join.slots.to_le_bytes());
    put_u32(&mut buf, jb::OPTION, join.option);
    buf
}
