//! SQLite-backed cache of the mirrored contract state.
//!
//! [`Store`] only remembers where the file is. Every operation opens its
//! own connection, does its work (inside one transaction when it writes
//! more than one row) and closes it again, so a store value is cheap to
//! clone into blocking tasks. Async callers go through [`Store::blocking`].

pub mod migrate;
mod schema;

pub use migrate::{AppliedStep, MigrationReport, SchemaMigrator, SchemaVersion, CURRENT_VERSION};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::node::NodeAddress;
use crate::types::{
    Bet, BetInfo, BetStatus, NodeBasicInfo, OptionParticipants, Oracle, QtryDateTime, TickInfo,
};

/// File name of the cache inside the configured directory.
pub const DATABASE_FILE: &str = "database.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `database.db` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DATABASE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Run `f` against a clone of this store on the blocking pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    // ========================================================================
    // Bets
    // ========================================================================

    /// Full replace of one bet row together with the option-detail rows
    /// fetched alongside it, in one transaction. Options missing from
    /// `details` keep whatever rows they had.
    pub fn upsert_bet(
        &self,
        bet: &Bet,
        details: &[(u32, OptionParticipants)],
    ) -> Result<(), StoreError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        write_bet(&tx, bet)?;
        for (option, participants) in details {
            write_option_detail(&tx, bet.bet_id(), *option, participants)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_bet(&self, bet_id: u32) -> Result<Option<Bet>, StoreError> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT bet_id, no_options, creator, bet_desc, option_desc, current_bet_state,
                        max_slot_per_option, amount_per_bet_slot,
                        open_date, close_date, end_date, open_time, close_time, end_time,
                        result, oracle_id, oracle_fee, oracle_vote, status,
                        current_total_qus, betting_odds
                 FROM quottery_info WHERE bet_id = ?1",
                [bet_id],
                BetRow::from_row,
            )
            .optional()?;
        row.map(BetRow::into_bet).transpose()
    }

    pub fn known_bet_ids(&self) -> Result<BTreeSet<u32>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT bet_id FROM quottery_info")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, u32>(0))?
            .collect::<Result<_, _>>()?;
        Ok(ids)
    }

    /// Flip `ids` to inactive. Rows are never deleted. Returns how many
    /// rows were active before.
    pub fn mark_inactive(&self, ids: &[u32]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE quottery_info SET status = ?1 WHERE bet_id = ?2 AND status != ?1",
            )?;
            for id in ids {
                changed += stmt.execute(params![BetStatus::Inactive.as_db(), id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    // ========================================================================
    // Option details
    // ========================================================================

    pub fn load_option_detail(
        &self,
        bet_id: u32,
        option: u32,
    ) -> Result<Option<OptionParticipants>, StoreError> {
        let conn = self.open()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT user_slots FROM bet_options_detail WHERE bet_id = ?1 AND option_id = ?2",
                [bet_id, option],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|json| from_json("user_slots", &json)).transpose()
    }

    // ========================================================================
    // Node basic info
    // ========================================================================

    pub fn replace_basic_info(
        &self,
        node: &NodeAddress,
        info: &NodeBasicInfo,
    ) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO node_basic_info (
                ip, port, fee_per_slot_per_hour, min_amount_per_slot,
                game_operator_fee, shareholders_fee, burn_fee, num_issued_bet,
                moneyflow, moneyflow_through_issuebet, moneyflow_through_joinbet,
                moneyflow_through_finalize, shareholders_earned_amount,
                shareholders_paid_amount, winners_earned_amount, distributed_amount,
                burned_amount, game_operator_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                node.host,
                node.port,
                to_sql_int(info.fee_per_slot_per_hour),
                to_sql_int(info.min_amount_per_slot),
                info.game_operator_fee,
                info.shareholders_fee,
                info.burn_fee,
                to_sql_int(info.issued_bets),
                to_sql_int(info.money_flow),
                to_sql_int(info.money_flow_through_issue_bet),
                to_sql_int(info.money_flow_through_join_bet),
                to_sql_int(info.money_flow_through_finalize_bet),
                to_sql_int(info.shareholders_earned_amount),
                to_sql_int(info.shareholders_paid_amount),
                to_sql_int(info.winners_earned_amount),
                to_sql_int(info.distributed_amount),
                to_sql_int(info.burned_amount),
                info.game_operator,
            ],
        )?;
        Ok(())
    }

    pub fn load_basic_info(&self, node: &NodeAddress) -> Result<Option<NodeBasicInfo>, StoreError> {
        let conn = self.open()?;
        let info = conn
            .query_row(
                "SELECT fee_per_slot_per_hour, min_amount_per_slot, game_operator_fee,
                        shareholders_fee, burn_fee, num_issued_bet, moneyflow,
                        moneyflow_through_issuebet, moneyflow_through_joinbet,
                        moneyflow_through_finalize, shareholders_earned_amount,
                        shareholders_paid_amount, winners_earned_amount,
                        distributed_amount, burned_amount, game_operator_id
                 FROM node_basic_info WHERE ip = ?1 AND port = ?2",
                params![node.host, node.port],
                |row| {
                    Ok(NodeBasicInfo {
                        fee_per_slot_per_hour: from_sql_int(row.get(0)?),
                        min_amount_per_slot: from_sql_int(row.get(1)?),
                        game_operator_fee: row.get(2)?,
                        shareholders_fee: row.get(3)?,
                        burn_fee: row.get(4)?,
                        issued_bets: from_sql_int(row.get(5)?),
                        money_flow: from_sql_int(row.get(6)?),
                        money_flow_through_issue_bet: from_sql_int(row.get(7)?),
                        money_flow_through_join_bet: from_sql_int(row.get(8)?),
                        money_flow_through_finalize_bet: from_sql_int(row.get(9)?),
                        shareholders_earned_amount: from_sql_int(row.get(10)?),
                        shareholders_paid_amount: from_sql_int(row.get(11)?),
                        winners_earned_amount: from_sql_int(row.get(12)?),
                        distributed_amount: from_sql_int(row.get(13)?),
                        burned_amount: from_sql_int(row.get(14)?),
                        game_operator: row.get(15)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Drop every node's row, so a previously configured node never shows
    /// through. Run once at startup.
    pub fn clear_basic_info(&self) -> Result<usize, StoreError> {
        let conn = self.open()?;
        Ok(conn.execute("DELETE FROM node_basic_info", [])?)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub fn read_tick(&self) -> Result<TickInfo, StoreError> {
        let conn = self.open()?;
        let tick = conn
            .query_row(
                "SELECT tick_number, epoch, tick_duration, number_of_aligned_votes,
                        number_of_misaligned_votes, initial_tick
                 FROM tick_info LIMIT 1",
                [],
                |row| {
                    Ok(TickInfo {
                        tick: row.get(0)?,
                        epoch: row.get(1)?,
                        tick_duration: row.get(2)?,
                        aligned_votes: row.get(3)?,
                        misaligned_votes: row.get(4)?,
                        initial_tick: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(tick.unwrap_or_default())
    }

    /// Persist `fetched`, never moving the stored tick backwards. When the
    /// node reports an older tick, only the tick number is kept from the
    /// stored row. Returns the tick now stored.
    pub fn write_tick(&self, fetched: &TickInfo) -> Result<u32, StoreError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let stored: Option<u32> = tx
            .query_row("SELECT tick_number FROM tick_info LIMIT 1", [], |row| row.get(0))
            .optional()?;
        let tick = stored.map_or(fetched.tick, |stored| stored.max(fetched.tick));
        tx.execute("DELETE FROM tick_info", [])?;
        tx.execute(
            "INSERT INTO tick_info (
                tick_number, epoch, tick_duration,
                number_of_aligned_votes, number_of_misaligned_votes, initial_tick
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tick,
                fetched.epoch,
                fetched.tick_duration,
                fetched.aligned_votes,
                fetched.misaligned_votes,
                fetched.initial_tick,
            ],
        )?;
        tx.commit()?;
        Ok(tick)
    }
}

// ==============================================================================
// Row mapping
// ==============================================================================

/// SQLite integers are signed; counters above `i64::MAX` saturate.
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: Option<i64>) -> u64 {
    value.map_or(0, |v| u64::try_from(v).unwrap_or(0))
}

fn to_json<T: Serialize>(column: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Json { column, source })
}

fn from_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Json { column, source })
}

fn write_bet(conn: &Connection, bet: &Bet) -> Result<(), StoreError> {
    let info = &bet.info;
    let oracle_ids: Vec<&str> = info.oracles.iter().map(|o| o.identity.as_str()).collect();
    let oracle_fees: Vec<f64> = info.oracles.iter().map(|o| o.fee_percent).collect();
    conn.execute(
        "INSERT OR REPLACE INTO quottery_info (
            bet_id, no_options, creator, bet_desc, option_desc, current_bet_state,
            max_slot_per_option, amount_per_bet_slot,
            open_date, close_date, end_date, open_time, close_time, end_time,
            result, no_ops, oracle_id, oracle_fee, oracle_vote, status,
            current_num_selection, current_total_qus, betting_odds
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        params![
            info.bet_id,
            info.no_options,
            info.creator,
            info.description,
            to_json("option_desc", &info.option_descriptions)?,
            to_json("current_bet_state", &info.slot_state)?,
            info.max_slots_per_option,
            to_sql_int(info.amount_per_slot),
            info.open.date_string(),
            info.close.date_string(),
            info.end.date_string(),
            info.open.time_string(),
            info.close.time_string(),
            info.end.time_string(),
            bet.result,
            info.oracles.len() as i64,
            to_json("oracle_id", &oracle_ids)?,
            to_json("oracle_fee", &oracle_fees)?,
            to_json("oracle_vote", &info.oracle_votes)?,
            bet.status.as_db(),
            to_json("current_num_selection", &info.slot_state)?,
            bet.current_total.to_string(),
            to_json("betting_odds", &bet.odds)?,
        ],
    )?;
    Ok(())
}

fn write_option_detail(
    conn: &Connection,
    bet_id: u32,
    option: u32,
    participants: &OptionParticipants,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO bet_options_detail (bet_id, option_id, user_slots)
         VALUES (?1, ?2, ?3)",
        params![bet_id, option, to_json("user_slots", participants)?],
    )?;
    Ok(())
}

/// Raw column values of one `quottery_info` row; JSON columns are decoded
/// in [`BetRow::into_bet`] so their errors name the column.
struct BetRow {
    bet_id: u32,
    no_options: u32,
    creator: String,
    description: String,
    option_desc: String,
    slot_state: Option<String>,
    max_slots_per_option: u32,
    amount_per_slot: f64,
    dates: [Option<String>; 6],
    result: Option<i32>,
    oracle_ids: Option<String>,
    oracle_fees: Option<String>,
    oracle_votes: Option<String>,
    status: Option<i64>,
    current_total: Option<String>,
    odds: Option<String>,
}

impl BetRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            bet_id: row.get(0)?,
            no_options: row.get(1)?,
            creator: row.get(2)?,
            description: row.get(3)?,
            option_desc: row.get(4)?,
            slot_state: row.get(5)?,
            max_slots_per_option: row.get(6)?,
            amount_per_slot: row.get(7)?,
            dates: [
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
                row.get(11)?,
                row.get(12)?,
                row.get(13)?,
            ],
            result: row.get(14)?,
            oracle_ids: row.get(15)?,
            oracle_fees: row.get(16)?,
            oracle_votes: row.get(17)?,
            status: row.get(18)?,
            current_total: row.get(19)?,
            odds: row.get(20)?,
        })
    }

    fn into_bet(self) -> Result<Bet, StoreError> {
        let oracle_ids: Vec<String> = json_list("oracle_id", self.oracle_ids)?;
        let oracle_fees: Vec<f64> = json_list("oracle_fee", self.oracle_fees)?;
        let oracle_votes: Vec<i8> = json_list("oracle_vote", self.oracle_votes)?;
        let slot_state: Vec<u32> = json_list("current_bet_state", self.slot_state)?;
        let odds = match self.odds.filter(|raw| !raw.is_empty()) {
            Some(raw) => parse_odds(&raw)?,
            None => Vec::new(),
        };

        let [open_date, close_date, end_date, open_time, close_time, end_time] = self.dates;
        let when = |date: Option<String>, time: Option<String>| {
            QtryDateTime::parse(date.as_deref().unwrap_or(""), time.as_deref().unwrap_or(""))
                .unwrap_or_default()
        };

        let oracles = oracle_ids
            .into_iter()
            .zip(oracle_fees.into_iter().chain(std::iter::repeat(0.0)))
            .map(|(identity, fee_percent)| Oracle {
                identity,
                fee_percent,
            })
            .collect();

        Ok(Bet {
            info: BetInfo {
                bet_id: self.bet_id,
                no_options: self.no_options,
                creator: self.creator,
                description: self.description,
                option_descriptions: from_json("option_desc", &self.option_desc)?,
                oracles,
                oracle_votes,
                open: when(open_date, open_time),
                close: when(close_date, close_time),
                end: when(end_date, end_time),
                amount_per_slot: self.amount_per_slot.max(0.0) as u64,
                max_slots_per_option: self.max_slots_per_option,
                slot_state,
            },
            result: self.result.unwrap_or(-1),
            status: BetStatus::from_db(self.status.unwrap_or(0)),
            current_total: self
                .current_total
                .as_deref()
                .and_then(|raw| {
                    raw.parse::<u64>()
                        .ok()
                        .or_else(|| raw.parse::<f64>().ok().map(|v| v.max(0.0) as u64))
                })
                .unwrap_or(0),
            odds,
        })
    }
}

/// NULL and empty columns read as an empty list.
fn json_list<T: DeserializeOwned>(
    column: &'static str,
    raw: Option<String>,
) -> Result<Vec<T>, StoreError> {
    match raw.filter(|raw| !raw.is_empty()) {
        Some(raw) => from_json(column, &raw),
        None => Ok(Vec::new()),
    }
}

/// Odds are written as a JSON number array; older caches hold the numbers
/// as strings.
fn parse_odds(raw: &str) -> Result<Vec<f64>, StoreError> {
    let values: Vec<serde_json::Value> = from_json("betting_odds", raw)?;
    Ok(values
        .iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
            other => other.as_f64().unwrap_or(0.0),
        })
        .collect())
}
