//! Local replica of the node's oracle vote acceptance rule.
//!
//! The node never reports an aggregated result for a bet that is still in
//! flight, only the raw votes, so the cache derives it the same way the
//! contract does: the most voted option wins once its tally reaches two
//! thirds of the *configured* oracles.

use crate::types::{MAX_OPTIONS, NO_VOTE};

/// Tally of one bet's oracle votes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consensus {
    /// Winning option, or `-1` while unresolved.
    pub result: i32,
    /// Most voted option, `None` when nobody voted yet.
    pub dominant: Option<u8>,
    pub dominant_count: usize,
    pub votes_cast: usize,
    /// `configured * 2 / 3` as a real number.
    pub required: f64,
}

/// Resolve a bet's result from the votes of its configured oracles.
///
/// `votes` holds one entry per configured oracle; negative entries have not
/// voted. The threshold is compared as an unrounded real, matching the
/// contract: with 8 oracles, 6 agreeing votes settle a bet and 5 do not.
/// Ties go to the lowest option index.
#[must_use]
pub fn resolve(votes: &[i8]) -> Consensus {
    let configured = votes.len();
    let required = configured as f64 * 2.0 / 3.0;

    let mut tally = [0usize; MAX_OPTIONS];
    let mut votes_cast = 0;
    for &vote in votes {
        if vote <= NO_VOTE {
            continue;
        }
        if let Some(count) = tally.get_mut(vote as usize) {
            *count += 1;
            votes_cast += 1;
        }
    }

    let mut dominant = None;
    let mut dominant_count = 0;
    for (option, &count) in tally.iter().enumerate() {
        if count > dominant_count {
            dominant = Some(option as u8);
            dominant_count = count;
        }
    }

    let result = match dominant {
        Some(option) if votes_cast > 0 && dominant_count as f64 >= required => i32::from(option),
        _ => i32::from(NO_VOTE),
    };

    Consensus {
        result,
        dominant,
        dominant_count,
        votes_cast,
        required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_of_eight_is_unresolved() {
        let c = resolve(&[0, 0, 0, 1, 1, -1, -1, -1]);
        assert_eq!(c.dominant, Some(0));
        assert_eq!(c.dominant_count, 3);
        assert!((c.required - 5.333).abs() < 0.001);
        assert_eq!(c.result, -1);
    }

    #[test]
    fn six_of_eight_resolves() {
        let c = resolve(&[0, 0, 0, 0, 0, 0, -1, -1]);
        assert_eq!(c.dominant_count, 6);
        assert_eq!(c.result, 0);
    }

    #[test]
    fn five_of_eight_is_below_real_threshold() {
        // ceil(16/3) would also give 6, but 5 must fail against 5.33.
        assert_eq!(resolve(&[2, 2, 2, 2, 2, -1, -1, -1]).result, -1);
    }

    #[test]
    fn two_of_three_resolves_exactly_at_threshold() {
        assert_eq!(resolve(&[1, 1, -1]).result, 1);
        assert_eq!(resolve(&[1, -1, -1]).result, -1);
    }

    #[test]
    fn single_oracle_decides_alone() {
        assert_eq!(resolve(&[3]).result, 3);
        assert_eq!(resolve(&[-1]).result, -1);
    }

    #[test]
    fn no_oracles_never_resolve() {
        let c = resolve(&[]);
        assert_eq!(c.result, -1);
        assert_eq!(c.dominant, None);
        assert_eq!(c.required, 0.0);
    }

    #[test]
    fn no_votes_cast_is_unresolved() {
        let c = resolve(&[-1, -1, -1]);
        assert_eq!(c.votes_cast, 0);
        assert_eq!(c.result, -1);
    }

    #[test]
    fn tie_goes_to_lowest_option_not_first_vote() {
        let c = resolve(&[1, 0, 1, 0]);
        assert_eq!(c.dominant, Some(0));
        assert_eq!(c.dominant_count, 2);
        // 2 < 4 * 2 / 3
        assert_eq!(c.result, -1);
    }
}
