//! Byte offsets and sizes of every fixed-layout record.
//!
//! All integers are little-endian. Padding the node's struct alignment
//! introduces is listed as its own offset so nothing relies on host layout.

/// Size of a public key / identity block.
pub const KEY_SIZE: usize = 32;

/// Size of a NUL-padded text block.
pub const TEXT_SIZE: usize = 32;

/// Width of one encoded date-time slot in either layout.
pub const DATE_SIZE: usize = 4;

pub const OPTION_SLOTS: usize = 8;
pub const ORACLE_SLOTS: usize = 8;

/// Maximum bettors the node returns for one option.
pub const MAX_BETTORS_PER_OPTION: usize = 1024;

// ==============================================================================
// Basic Info (152 bytes)
// ==============================================================================

pub mod basic_info {
    /// Fifteen consecutive u64 counters start at offset 0, in this order.
    pub const FEE_PER_SLOT_PER_HOUR: usize = 0;
    pub const GAME_OPERATOR_FEE: usize = 8;
    pub const SHAREHOLDER_FEE: usize = 16;
    pub const MIN_BET_SLOT_AMOUNT: usize = 24;
    pub const BURN_FEE: usize = 32;
    pub const ISSUED_BETS: usize = 40;
    pub const MONEY_FLOW: usize = 48;
    pub const MONEY_FLOW_ISSUE_BET: usize = 56;
    pub const MONEY_FLOW_JOIN_BET: usize = 64;
    pub const MONEY_FLOW_FINALIZE_BET: usize = 72;
    pub const EARNED_FOR_SHAREHOLDER: usize = 80;
    pub const PAID_FOR_SHAREHOLDER: usize = 88;
    pub const EARNED_FOR_WINNER: usize = 96;
    pub const DISTRIBUTED: usize = 104;
    pub const BURNED: usize = 112;
    pub const GAME_OPERATOR: usize = 120;
    pub const SIZE: usize = 152;
}

// ==============================================================================
// Bet Info (696 bytes)
// ==============================================================================

pub mod bet_info {
    pub const BET_ID: usize = 0;
    pub const NO_OPTIONS: usize = 4;
    pub const CREATOR: usize = 8;
    pub const DESCRIPTION: usize = 40;
    /// 8 × 32-byte option descriptions.
    pub const OPTION_DESCRIPTIONS: usize = 72;
    /// 8 × 32-byte oracle public keys.
    pub const ORACLE_IDS: usize = 328;
    /// 8 × u32 oracle fees, ×100 fixed point.
    pub const ORACLE_FEES: usize = 584;
    pub const OPEN: usize = 616;
    pub const CLOSE: usize = 620;
    pub const END: usize = 624;
    // 628..632: alignment padding before the u64.
    pub const AMOUNT_PER_SLOT: usize = 632;
    pub const MAX_SLOTS_PER_OPTION: usize = 640;
    /// 8 × u32 filled-slot counters.
    pub const SLOT_STATE: usize = 644;
    /// 8 × i8 option each vote chose, -1 when unused.
    pub const VOTE_OPTION: usize = 676;
    /// 8 × i8 oracle slot that cast each vote, -1 when unused.
    pub const VOTE_OPERATOR: usize = 684;
    // 692..696: trailing struct padding.
    pub const SIZE: usize = 696;
}

// ==============================================================================
// Issue / Join inputs
// ==============================================================================

pub mod issue_bet {
    pub const DESCRIPTION: usize = 0;
    pub const OPTION_DESCRIPTIONS: usize = 32;
    pub const ORACLE_IDS: usize = 288;
    pub const ORACLE_FEES: usize = 544;
    pub const CLOSE: usize = 576;
    pub const END: usize = 580;
    pub const AMOUNT_PER_SLOT: usize = 584;
    pub const MAX_SLOTS_PER_OPTION: usize = 592;
    pub const NO_OPTIONS: usize = 596;
    pub const SIZE: usize = 600;
}

pub mod join_bet {
    pub const BET_ID: usize = 0;
    pub const SLOTS: usize = 4;
    pub const OPTION: usize = 8;
    // 12..16: placeholder word, always zero.
    pub const SIZE: usize = 16;
}
