use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("node communication failure: {0}")]
    Node(#[from] NodeError),

    #[error("invalid wire data: {0}")]
    Decode(#[from] DecodeError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("schema migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A binary payload that does not match the fixed layout it claims to be.
/// Scoped to a single record: callers skip it and keep going.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record} payload too short: expected {expected} bytes, got {actual}")]
    Truncated {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("option count {0} outside 1..=8")]
    OptionCount(u32),

    #[error("vote for option {option} but bet only has {no_options} options")]
    VoteOption { option: i8, no_options: u32 },

    #[error("vote from operator slot {operator} but only {configured} oracles are configured")]
    VoteOperator { operator: i8, configured: usize },
}

/// Failures talking to the node. All of them are transient from the
/// engine's point of view.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("node answered with HTTP status {0}")]
    HttpStatus(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("node has no data for this request yet")]
    NoData,

    #[error("undecodable response: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid identity in response: {0}")]
    Identity(#[from] IdentityError),
}

impl NodeError {
    /// Non-zero status code matching the node wrapper convention:
    /// `1` for any failure, `2` when the node simply has nothing yet.
    pub fn status(&self) -> u8 {
        match self {
            Self::NoData => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("column `{column}` holds invalid JSON: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Fatal at startup: the engine never runs against a schema it does not
/// recognise.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("malformed schema version token `{0}`")]
    MalformedVersion(String),

    #[error("schema version {found} is newer than the supported {supported}")]
    FromTheFuture { found: String, supported: String },

    #[error("no migration path from {reached} to {target}")]
    Unreachable { reached: String, target: String },

    #[error("backup of {} failed: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("step {from} -> {to} failed: {source}")]
    Step {
        from: String,
        to: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity must be 60 characters, got {0}")]
    Length(usize),

    #[error("identity contains invalid character {0:?}")]
    Character(char),

    #[error("identity checksum does not match its key")]
    Checksum,
}
