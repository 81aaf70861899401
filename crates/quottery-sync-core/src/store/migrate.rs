//! Versioned upgrades of the cache file.
//!
//! The file carries a single `major.minor` token in the `version` table.
//! Older files are upgraded one step at a time; before each step the file
//! is copied next to itself as `<stem>_v<tag>_bk_<YYYYmmddHHMMSS>.db`, and
//! the step's DDL and version bump commit together. A file newer than this
//! build understands is refused.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Transaction};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::error::MigrationError;

use super::schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

/// Layout this build reads and writes.
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(2, 1);

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Accepts `major.minor` and a bare `major` (read as `major.0`).
impl FromStr for SchemaVersion {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MigrationError::MalformedVersion(s.to_owned());
        let (major, minor) = match s.trim().split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s.trim(), "0"),
        };
        Ok(Self {
            major: major.parse().map_err(|_| malformed())?,
            minor: minor.parse().map_err(|_| malformed())?,
        })
    }
}

// ==============================================================================
// Steps
// ==============================================================================

struct Step {
    to: SchemaVersion,
    /// Backup file tag; names the version being left.
    backup_tag: &'static str,
    apply: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

const STEPS: &[Step] = &[
    Step {
        to: SchemaVersion::new(1, 0),
        backup_tag: "00",
        apply: unversioned_to_1_0,
    },
    Step {
        to: SchemaVersion::new(2, 0),
        backup_tag: "10",
        apply: v1_0_to_2_0,
    },
    Step {
        to: SchemaVersion::new(2, 1),
        backup_tag: "20",
        apply: v2_0_to_2_1,
    },
];

/// Adds the version table. The fee column moved from per-day to per-hour
/// units, so existing values are meaningless and are zeroed.
fn unversioned_to_1_0(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    if schema::table_exists(tx, "version")? && !schema::column_exists(tx, "version", "version_info")? {
        tx.execute("DROP TABLE version", [])?;
    }
    schema::create_version_table(tx)?;
    if schema::column_exists(tx, "node_basic_info", "fee_per_slot_per_day")? {
        tx.execute(
            "ALTER TABLE node_basic_info RENAME COLUMN fee_per_slot_per_day TO fee_per_slot_per_hour",
            [],
        )?;
        tx.execute("UPDATE node_basic_info SET fee_per_slot_per_hour = 0", [])?;
    }
    Ok(())
}

fn v1_0_to_2_0(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    schema::create_bet_options_detail(tx)
}

fn v2_0_to_2_1(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    schema::create_tick_info(tx)
}

// ==============================================================================
// Migrator
// ==============================================================================

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// The file did not exist and was created at [`CURRENT_VERSION`].
    pub created: bool,
    /// Version found on disk; `None` for a fresh or unversioned file.
    pub found: Option<SchemaVersion>,
    pub applied: Vec<AppliedStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStep {
    pub to: SchemaVersion,
    pub backup: PathBuf,
}

pub struct SchemaMigrator {
    path: PathBuf,
    now: fn() -> OffsetDateTime,
}

impl SchemaMigrator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            now: OffsetDateTime::now_utc,
        }
    }

    /// Clock used for backup file names.
    pub fn with_clock(mut self, now: fn() -> OffsetDateTime) -> Self {
        self.now = now;
        self
    }

    /// Bring the file to [`CURRENT_VERSION`], creating it if absent.
    pub fn run(&self) -> Result<MigrationReport, MigrationError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no cache file found, creating version {CURRENT_VERSION}");
            let mut conn = Connection::open(&self.path)?;
            let tx = conn.transaction()?;
            schema::create_all(&tx, &CURRENT_VERSION.to_string())?;
            tx.commit()?;
            return Ok(MigrationReport {
                created: true,
                found: None,
                applied: Vec::new(),
            });
        }

        let mut conn = Connection::open(&self.path)?;
        let found = read_version(&conn)?;
        let mut report = MigrationReport {
            created: false,
            found,
            applied: Vec::new(),
        };

        match found {
            Some(v) if v == CURRENT_VERSION => {
                info!(version = %v, "cache version matches, no migration needed");
            }
            Some(v) if v > CURRENT_VERSION => {
                return Err(MigrationError::FromTheFuture {
                    found: v.to_string(),
                    supported: CURRENT_VERSION.to_string(),
                });
            }
            _ => {
                info!(
                    found = %found.map_or_else(|| "unversioned".to_owned(), |v| v.to_string()),
                    supported = %CURRENT_VERSION,
                    "cache version mismatch, migrating"
                );
                let reached = self.apply_steps(&mut conn, found, &mut report)?;
                if reached != CURRENT_VERSION {
                    return Err(MigrationError::Unreachable {
                        reached: reached.to_string(),
                        target: CURRENT_VERSION.to_string(),
                    });
                }
            }
        }

        schema::create_missing(&conn)?;
        Ok(report)
    }

    fn apply_steps(
        &self,
        conn: &mut Connection,
        found: Option<SchemaVersion>,
        report: &mut MigrationReport,
    ) -> Result<SchemaVersion, MigrationError> {
        let mut current = found;
        for step in STEPS {
            if current.is_some_and(|v| v >= step.to) {
                continue;
            }
            let from = current.map_or_else(|| "unversioned".to_owned(), |v| v.to_string());
            info!(%from, to = %step.to, "migrating cache");

            let backup = self.backup(step.backup_tag)?;
            let step_err = |source| MigrationError::Step {
                from: from.clone(),
                to: step.to.to_string(),
                source,
            };
            let tx = conn.transaction().map_err(step_err)?;
            (step.apply)(&tx).map_err(step_err)?;
            schema::set_version(&tx, &step.to.to_string()).map_err(step_err)?;
            tx.commit().map_err(step_err)?;

            info!(version = %step.to, backup = %backup.display(), "cache migrated");
            report.applied.push(AppliedStep {
                to: step.to,
                backup,
            });
            current = Some(step.to);
        }
        current.ok_or_else(|| MigrationError::Unreachable {
            reached: "unversioned".to_owned(),
            target: CURRENT_VERSION.to_string(),
        })
    }

    fn backup(&self, tag: &str) -> Result<PathBuf, MigrationError> {
        let stamp = (self.now)()
            .format(format_description!("[year][month][day][hour][minute][second]"))
            .unwrap_or_else(|_| "00000000000000".to_owned());
        let path = backup_path(&self.path, tag, &stamp);
        std::fs::copy(&self.path, &path).map_err(|source| MigrationError::Backup {
            path: path.clone(),
            source,
        })?;
        info!(backup = %path.display(), "cache backed up");
        Ok(path)
    }
}

fn backup_path(db: &Path, tag: &str, stamp: &str) -> PathBuf {
    let stem = db
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "database".to_owned());
    db.with_file_name(format!("{stem}_v{tag}_bk_{stamp}.db"))
}

/// `None` when the file predates versioning.
fn read_version(conn: &Connection) -> Result<Option<SchemaVersion>, MigrationError> {
    if !schema::table_exists(conn, "version")? || !schema::column_exists(conn, "version", "version_info")? {
        return Ok(None);
    }
    let token: Option<String> = conn
        .query_row("SELECT version_info FROM version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match token {
        Some(token) => token.parse().map(Some),
        None => Err(MigrationError::MalformedVersion(String::new())),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn fixed_clock() -> OffsetDateTime {
        datetime!(2024-07-01 09:08:07 UTC)
    }

    fn version_of(path: &Path) -> String {
        let conn = Connection::open(path).expect("open");
        conn.query_row("SELECT version_info FROM version", [], |row| row.get(0))
            .expect("version row")
    }

    /// A cache as the first release wrote it: no version table, fee
    /// counted per day.
    fn write_unversioned(path: &Path) {
        let conn = Connection::open(path).expect("open");
        conn.execute_batch(
            "CREATE TABLE quottery_info (bet_id INTEGER PRIMARY KEY, no_options INTEGER NOT NULL,
                creator TEXT NOT NULL, bet_desc TEXT NOT NULL, option_desc TEXT NOT NULL,
                current_bet_state TEXT, max_slot_per_option INTEGER NOT NULL,
                amount_per_bet_slot REAL NOT NULL, open_date TEXT, close_date TEXT, end_date TEXT,
                open_time TEXT, close_time TEXT, end_time TEXT, result INTEGER, no_ops INTEGER,
                oracle_id TEXT, oracle_fee REAL, oracle_vote TEXT, status INTEGER,
                current_num_selection TEXT, current_total_qus TEXT, betting_odds TEXT);
             INSERT INTO quottery_info (bet_id, no_options, creator, bet_desc, option_desc,
                max_slot_per_option, amount_per_bet_slot, status)
                VALUES (7, 2, 'CREATOR', 'old bet', '[\"a\",\"b\"]', 10, 1000, 1);
             CREATE TABLE node_basic_info (ip TEXT, port INTEGER, fee_per_slot_per_day INTEGER,
                PRIMARY KEY (ip, port));
             INSERT INTO node_basic_info VALUES ('1.2.3.4', 21841, 99);",
        )
        .expect("legacy schema");
    }

    #[test]
    fn version_tokens_parse() {
        assert_eq!("2.1".parse::<SchemaVersion>().ok(), Some(SchemaVersion::new(2, 1)));
        assert_eq!("2".parse::<SchemaVersion>().ok(), Some(SchemaVersion::new(2, 0)));
        assert!("two".parse::<SchemaVersion>().is_err());
        assert!(SchemaVersion::new(1, 0) < SchemaVersion::new(2, 0));
        assert!(SchemaVersion::new(2, 0) < SchemaVersion::new(2, 1));
    }

    #[test]
    fn backup_name_keeps_directory_and_stem() {
        let path = backup_path(Path::new("/data/database.db"), "10", "20240701090807");
        assert_eq!(path, PathBuf::from("/data/database_v10_bk_20240701090807.db"));
    }

    #[test]
    fn absent_file_is_created_at_current_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");

        let report = SchemaMigrator::new(&path).run().expect("create");
        assert!(report.created);
        assert!(report.applied.is_empty());
        assert_eq!(version_of(&path), "2.1");

        let conn = Connection::open(&path).expect("open");
        for table in ["quottery_info", "node_basic_info", "bet_options_detail", "tick_info"] {
            assert!(schema::table_exists(&conn, table).expect("query"), "{table} missing");
        }
        let ticks: i64 = conn
            .query_row("SELECT COUNT(*) FROM tick_info", [], |row| row.get(0))
            .expect("count");
        assert_eq!(ticks, 1);
    }

    #[test]
    fn current_file_is_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        SchemaMigrator::new(&path).run().expect("create");

        let report = SchemaMigrator::new(&path).run().expect("second run");
        assert!(!report.created);
        assert_eq!(report.found, Some(CURRENT_VERSION));
        assert!(report.applied.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 1);
    }

    #[test]
    fn unversioned_file_walks_every_step_with_backups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        write_unversioned(&path);

        let report = SchemaMigrator::new(&path)
            .with_clock(fixed_clock)
            .run()
            .expect("migrate");
        assert_eq!(report.found, None);
        let targets: Vec<String> = report.applied.iter().map(|s| s.to.to_string()).collect();
        assert_eq!(targets, vec!["1.0", "2.0", "2.1"]);
        for (step, tag) in report.applied.iter().zip(["00", "10", "20"]) {
            assert_eq!(
                step.backup,
                dir.path().join(format!("database_v{tag}_bk_20240701090807.db"))
            );
            assert!(step.backup.exists());
        }
        assert_eq!(version_of(&path), "2.1");

        let conn = Connection::open(&path).expect("open");
        let fee: i64 = conn
            .query_row("SELECT fee_per_slot_per_hour FROM node_basic_info", [], |row| row.get(0))
            .expect("renamed column");
        assert_eq!(fee, 0);
        let desc: String = conn
            .query_row("SELECT bet_desc FROM quottery_info WHERE bet_id = 7", [], |row| row.get(0))
            .expect("bet survives");
        assert_eq!(desc, "old bet");
        assert!(schema::table_exists(&conn, "bet_options_detail").expect("query"));
        assert!(schema::table_exists(&conn, "tick_info").expect("query"));
    }

    #[test]
    fn first_backup_holds_pre_migration_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        write_unversioned(&path);

        let report = SchemaMigrator::new(&path)
            .with_clock(fixed_clock)
            .run()
            .expect("migrate");
        let backup = Connection::open(&report.applied[0].backup).expect("open backup");
        assert!(!schema::table_exists(&backup, "version").expect("query"));
        assert!(schema::column_exists(&backup, "node_basic_info", "fee_per_slot_per_day").expect("query"));
    }

    #[test]
    fn mid_version_file_only_runs_remaining_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        {
            let conn = Connection::open(&path).expect("open");
            schema::create_version_table(&conn).expect("version table");
            schema::set_version(&conn, "2.0").expect("version");
            schema::create_quottery_info(&conn).expect("bets");
            schema::create_bet_options_detail(&conn).expect("details");
        }

        let report = SchemaMigrator::new(&path)
            .with_clock(fixed_clock)
            .run()
            .expect("migrate");
        assert_eq!(report.found, Some(SchemaVersion::new(2, 0)));
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].to, CURRENT_VERSION);
        assert!(report.applied[0]
            .backup
            .ends_with("database_v20_bk_20240701090807.db"));
        assert_eq!(version_of(&path), "2.1");

        let conn = Connection::open(&path).expect("open");
        assert!(schema::table_exists(&conn, "node_basic_info").expect("query"));
    }

    #[test]
    fn failed_step_rolls_back_and_keeps_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        {
            let conn = Connection::open(&path).expect("open");
            conn.execute_batch(
                "CREATE TABLE node_basic_info (ip TEXT, port INTEGER,
                    fee_per_slot_per_day INTEGER, fee_per_slot_per_hour INTEGER,
                    PRIMARY KEY (ip, port));
                 INSERT INTO node_basic_info VALUES ('1.2.3.4', 21841, 99, 5);",
            )
            .expect("conflicting schema");
        }

        let err = SchemaMigrator::new(&path)
            .with_clock(fixed_clock)
            .run()
            .expect_err("rename must collide");
        assert!(
            matches!(&err, MigrationError::Step { from, to, .. } if from == "unversioned" && to == "1.0"),
            "unexpected error: {err}"
        );

        let conn = Connection::open(&path).expect("open");
        assert!(!schema::table_exists(&conn, "version").expect("query"));
        assert!(schema::column_exists(&conn, "node_basic_info", "fee_per_slot_per_day").expect("query"));
        assert!(dir.path().join("database_v00_bk_20240701090807.db").exists());
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 2);
    }

    #[test]
    fn unwritable_backup_aborts_before_any_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        write_unversioned(&path);
        // A directory squatting on the backup name makes the copy fail.
        std::fs::create_dir(dir.path().join("database_v00_bk_20240701090807.db"))
            .expect("blocking dir");

        let err = SchemaMigrator::new(&path)
            .with_clock(fixed_clock)
            .run()
            .expect_err("backup must fail");
        assert!(matches!(err, MigrationError::Backup { .. }));

        let conn = Connection::open(&path).expect("open");
        assert!(!schema::table_exists(&conn, "version").expect("query"));
    }

    #[test]
    fn future_version_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        {
            let conn = Connection::open(&path).expect("open");
            schema::create_version_table(&conn).expect("version table");
            schema::set_version(&conn, "3.0").expect("version");
        }

        let err = SchemaMigrator::new(&path).run().expect_err("must refuse");
        assert!(matches!(err, MigrationError::FromTheFuture { .. }));
        assert_eq!(version_of(&path), "3.0");
    }

    #[test]
    fn garbage_version_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("database.db");
        {
            let conn = Connection::open(&path).expect("open");
            schema::create_version_table(&conn).expect("version table");
            schema::set_version(&conn, "latest").expect("version");
        }

        let err = SchemaMigrator::new(&path).run().expect_err("must refuse");
        assert!(matches!(err, MigrationError::MalformedVersion(token) if token == "latest"));
    }
}
