//! Table definitions of the cache file.
//!
//! Column names and affinities are kept compatible with caches written by
//! earlier versions of the service, which the read API still serves.

use rusqlite::{Connection, OptionalExtension};

pub(crate) fn create_version_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS version (
            version_info TEXT PRIMARY KEY
        )",
        [],
    )?;
    Ok(())
}

/// Replaces the single version row.
pub(crate) fn set_version(conn: &Connection, version: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM version", [])?;
    conn.execute("INSERT INTO version (version_info) VALUES (?1)", [version])?;
    Ok(())
}

pub(crate) fn create_quottery_info(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS quottery_info (
            bet_id INTEGER PRIMARY KEY,
            no_options INTEGER NOT NULL,
            creator TEXT NOT NULL,
            bet_desc TEXT NOT NULL,
            option_desc TEXT NOT NULL,
            current_bet_state TEXT,
            max_slot_per_option INTEGER NOT NULL,
            amount_per_bet_slot REAL NOT NULL,
            open_date TEXT,
            close_date TEXT,
            end_date TEXT,
            open_time TEXT,
            close_time TEXT,
            end_time TEXT,
            result INTEGER,
            no_ops INTEGER,
            oracle_id TEXT,
            oracle_fee REAL,
            oracle_vote TEXT,
            status INTEGER,
            current_num_selection TEXT,
            current_total_qus TEXT,
            betting_odds TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quottery_info_status ON quottery_info(status)",
        [],
    )?;
    Ok(())
}

pub(crate) fn create_node_basic_info(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS node_basic_info (
            ip TEXT,
            port INTEGER,
            fee_per_slot_per_hour INTEGER,
            min_amount_per_slot INTEGER,
            game_operator_fee REAL,
            shareholders_fee REAL,
            burn_fee REAL,
            num_issued_bet INTEGER,
            moneyflow INTEGER,
            moneyflow_through_issuebet INTEGER,
            moneyflow_through_joinbet INTEGER,
            moneyflow_through_finalize INTEGER,
            shareholders_earned_amount INTEGER,
            shareholders_paid_amount INTEGER,
            winners_earned_amount INTEGER,
            distributed_amount INTEGER,
            burned_amount INTEGER,
            game_operator_id TEXT,
            PRIMARY KEY (ip, port)
        )",
        [],
    )?;
    Ok(())
}

pub(crate) fn create_bet_options_detail(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bet_options_detail (
            bet_id INTEGER,
            option_id INTEGER,
            user_slots TEXT,
            PRIMARY KEY (bet_id, option_id)
        )",
        [],
    )?;
    Ok(())
}

/// Creates the tick table and leaves exactly one zeroed row in it.
pub(crate) fn create_tick_info(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tick_info (
            tick_number INTEGER,
            epoch INTEGER,
            tick_duration INTEGER,
            number_of_aligned_votes INTEGER,
            number_of_misaligned_votes INTEGER,
            initial_tick INTEGER,
            PRIMARY KEY (tick_number, epoch)
        )",
        [],
    )?;
    conn.execute("DELETE FROM tick_info", [])?;
    conn.execute(
        "INSERT INTO tick_info (
            tick_number, epoch, tick_duration,
            number_of_aligned_votes, number_of_misaligned_votes, initial_tick
        ) VALUES (0, 0, 0, 0, 0, 0)",
        [],
    )?;
    Ok(())
}

/// Every table of the current layout, stamped with `version`.
pub(crate) fn create_all(conn: &Connection, version: &str) -> rusqlite::Result<()> {
    create_version_table(conn)?;
    set_version(conn, version)?;
    create_quottery_info(conn)?;
    create_node_basic_info(conn)?;
    create_bet_options_detail(conn)?;
    create_tick_info(conn)?;
    Ok(())
}

/// Fills in tables a partially initialised file never got. Never touches
/// existing rows.
pub(crate) fn create_missing(conn: &Connection) -> rusqlite::Result<()> {
    create_quottery_info(conn)?;
    create_node_basic_info(conn)?;
    create_bet_options_detail(conn)?;
    if !table_exists(conn, "tick_info")? {
        create_tick_info(conn)?;
    }
    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt.query_map([table], |row| row.get::<_, String>(0))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
