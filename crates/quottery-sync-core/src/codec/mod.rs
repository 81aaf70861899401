//! Binary codec for the Quottery contract's query and input structures.
//!
//! Every record has a fixed little-endian layout. Offsets are spelled out in
//! [`layout`] instead of overlaying host structs, so padding the node's C
//! compiler inserts is explicit here too.
//!
//! Two date encodings exist in the wild. Which one a buffer uses is decided
//! by the connection ([`WireLayout`]), never by looking at the bytes.

mod bytes;
mod datetime;
mod inputs;
pub mod layout;
mod records;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use datetime::{decode_date, encode_date, pack_datetime, unpack_datetime};
pub use inputs::{
    encode_bet_id_request, encode_issue_bet, encode_join_bet, encode_option_detail_request,
    IssueBet, JoinBet,
};
pub use records::{
    decode_active_bet_ids, decode_basic_info, decode_bet_info, decode_option_detail,
    encode_active_bet_ids, encode_basic_info, encode_bet_info, RawBasicInfo, RawBetInfo,
    RawOptionDetail, RawOracle,
};

/// Date encoding used by a node connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireLayout {
    /// Three plain bytes `[YY, MM, DD]` (plus one pad byte); time is always
    /// midnight.
    Legacy,
    /// One 32-bit word with year/month/day/hour/minute/second bit fields.
    Packed,
}

impl FromStr for WireLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "packed" => Ok(Self::Packed),
            other => Err(format!("unknown wire layout `{other}`; expected legacy or packed")),
        }
    }
}

impl std::fmt::Display for WireLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Packed => write!(f, "packed"),
        }
    }
}
