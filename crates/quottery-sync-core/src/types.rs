//! Domain types for the mirrored Quottery contract state.
//!
//! `BetInfo` / `NodeBasicInfo` are what the node reports, with public keys
//! already converted to identities. `Bet` adds the fields this service
//! derives locally (consensus result, status, totals, odds) and is what the
//! store persists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Raw 32-byte public key as it travels on the wire.
pub type PublicKey = [u8; 32];

/// Upper bound on options per bet, fixed by the contract layout.
pub const MAX_OPTIONS: usize = 8;

/// Vote / result value meaning "no vote yet" or "unresolved".
pub const NO_VOTE: i8 = -1;

// ==============================================================================
// Date-time
// ==============================================================================

/// Calendar date-time as the contract stores it. No timezone is carried on
/// the wire; the node works in UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QtryDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl QtryDateTime {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// `YY-MM-DD`, the cache's date column format. Years are 2000-based on
    /// the wire, so two digits are lossless.
    pub fn date_string(&self) -> String {
        format!("{:02}-{:02}-{:02}", self.year % 100, self.month, self.day)
    }

    /// `HH:MM:SS`
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    /// Inverse of [`date_string`](Self::date_string) + [`time_string`](Self::time_string).
    /// A two-digit year is read as `2000 + YY`; four digits are taken as is.
    pub fn parse(date: &str, time: &str) -> Option<Self> {
        let mut d = date.split('-').map(str::parse::<u16>);
        let mut t = time.split(':').map(str::parse::<u8>);
        let year = d.next()?.ok()?;
        Some(Self {
            year: if year < 100 { 2000 + year } else { year },
            month: u8::try_from(d.next()?.ok()?).ok()?,
            day: u8::try_from(d.next()?.ok()?).ok()?,
            hour: t.next()?.ok()?,
            minute: t.next()?.ok()?,
            second: t.next()?.ok()?,
        })
    }

    /// `None` when the fields do not form a real calendar instant, which
    /// happens for bets created with garbage dates.
    pub fn to_utc(&self) -> Option<OffsetDateTime> {
        let month = Month::try_from(self.month).ok()?;
        let date = Date::from_calendar_date(i32::from(self.year), month, self.day).ok()?;
        let time = Time::from_hms(self.hour, self.minute, self.second).ok()?;
        Some(PrimitiveDateTime::new(date, time).assume_utc())
    }
}

impl std::fmt::Display for QtryDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {}",
            self.year,
            self.month,
            self.day,
            self.time_string()
        )
    }
}

// ==============================================================================
// Node Basic Info
// ==============================================================================

/// Node-wide fee schedule and money-flow counters. Percent fields are
/// already scaled back from the wire's ×100 fixed point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBasicInfo {
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
    pub game_operator: String,
}

// ==============================================================================
// Bets
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oracle {
    pub identity: String,
    pub fee_percent: f64,
}

/// A bet exactly as the node describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetInfo {
    pub bet_id: u32,
    /// Authoritative option count. May exceed `option_descriptions.len()`
    /// when some descriptions were left blank.
    pub no_options: u32,
    pub creator: String,
    pub description: String,
    pub option_descriptions: Vec<String>,
    pub oracles: Vec<Oracle>,
    /// One entry per configured oracle, [`NO_VOTE`] when it has not voted.
    pub oracle_votes: Vec<i8>,
    pub open: QtryDateTime,
    pub close: QtryDateTime,
    pub end: QtryDateTime,
    pub amount_per_slot: u64,
    pub max_slots_per_option: u32,
    /// Filled slots per option; length is `no_options`.
    pub slot_state: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Inactive,
    Active,
}

impl BetStatus {
    /// Column encoding inherited from the cache format: 1 active, 0 inactive.
    pub fn as_db(self) -> i64 {
        match self {
            Self::Active => 1,
            Self::Inactive => 0,
        }
    }

    pub fn from_db(value: i64) -> Self {
        if value == 0 {
            Self::Inactive
        } else {
            Self::Active
        }
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// A bet as persisted: the node's view plus locally derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub info: BetInfo,
    /// Winning option once oracles reach supermajority, otherwise `-1`.
    pub result: i32,
    pub status: BetStatus,
    pub current_total: u64,
    pub odds: Vec<f64>,
}

impl Bet {
    pub fn bet_id(&self) -> u32 {
        self.info.bet_id
    }
}

// ==============================================================================
// Option Detail and Tick
// ==============================================================================

/// Participants of one option: identity → number of slots held.
pub type OptionParticipants = BTreeMap<String, u32>;

/// Snapshot of the node's logical clock. The HTTP endpoint only guarantees
/// `tick`; the other fields default to zero there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub tick: u32,
    #[serde(default)]
    pub epoch: u16,
    #[serde(default, rename = "duration")]
    pub tick_duration: u16,
    #[serde(default)]
    pub aligned_votes: u16,
    #[serde(default)]
    pub misaligned_votes: u16,
    #[serde(default, rename = "initialTick")]
    pub initial_tick: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_strings_round_trip() {
        let dt = QtryDateTime::new(2024, 5, 31, 23, 59, 7);
        assert_eq!(dt.date_string(), "24-05-31");
        assert_eq!(dt.time_string(), "23:59:07");
        assert_eq!(
            QtryDateTime::parse(&dt.date_string(), &dt.time_string()),
            Some(dt)
        );
        assert_eq!(dt.to_string(), "2024-05-31 23:59:07");
    }

    #[test]
    fn two_digit_year_is_2000_based() {
        assert_eq!(
            QtryDateTime::parse("24-06-15", "00:00:00"),
            Some(QtryDateTime::new(2024, 6, 15, 0, 0, 0))
        );
        assert_eq!(
            QtryDateTime::parse("2024-06-15", "08:30:00"),
            Some(QtryDateTime::new(2024, 6, 15, 8, 30, 0))
        );
    }

    #[test]
    fn invalid_calendar_date_has_no_instant() {
        assert!(QtryDateTime::new(2024, 2, 30, 0, 0, 0).to_utc().is_none());
        assert!(QtryDateTime::new(2024, 13, 1, 0, 0, 0).to_utc().is_none());
        assert!(QtryDateTime::new(2024, 2, 29, 12, 0, 0).to_utc().is_some());
    }

    #[test]
    fn tick_info_accepts_http_shape() {
        let parsed: TickInfo =
            serde_json::from_value(serde_json::json!({"tick": 1234, "epoch": 5}))
                .expect("tick info must parse");
        assert_eq!(parsed.tick, 1234);
        assert_eq!(parsed.epoch, 5);
        assert_eq!(parsed.initial_tick, 0);
    }

    #[test]
    fn status_db_encoding() {
        assert_eq!(BetStatus::from_db(BetStatus::Active.as_db()), BetStatus::Active);
        assert_eq!(BetStatus::from_db(0), BetStatus::Inactive);
    }
}
