use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::codec::{encode_active_bet_ids, encode_bet_info, RawBetInfo, WireLayout};
use crate::error::NodeError;
use crate::types::{PublicKey, TickInfo};

use super::{NodeTransport, QueryType};

/// A mock node for testing. Serves canned payloads populated via the
/// builder pattern; the setters let a test change what the node reports
/// between engine cycles.
pub struct MockTransport {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    /// `None` makes `GetActiveBet` fail.
    active_ids: Option<Vec<u32>>,
    basic_info: Option<Vec<u8>>,
    bets: HashMap<u32, Vec<u8>>,
    failing_bets: HashSet<u32>,
    option_details: HashMap<(u32, u32), Vec<u8>>,
    creator_bets: HashMap<PublicKey, Vec<u32>>,
    tick: Option<TickInfo>,
    calls: HashMap<QueryType, usize>,
}

fn unavailable(what: impl std::fmt::Display) -> NodeError {
    NodeError::InvalidResponse(format!("mock: {what} not available"))
}

fn u32_at(input: &[u8], offset: usize) -> Option<u32> {
    let bytes = input.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            state: MockState::default(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_active_bets(&self, ids: Option<Vec<u32>>) {
        self.state().active_ids = ids;
    }

    pub fn set_bet(&self, layout: WireLayout, info: RawBetInfo) {
        self.state()
            .bets
            .insert(info.bet_id, encode_bet_info(layout, &info));
    }

    pub fn fail_bet(&self, bet_id: u32, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_bets.insert(bet_id);
        } else {
            state.failing_bets.remove(&bet_id);
        }
    }

    pub fn set_basic_info(&self, payload: Option<Vec<u8>>) {
        self.state().basic_info = payload;
    }

    pub fn set_option_detail(&self, bet_id: u32, option: u32, payload: Vec<u8>) {
        self.state().option_details.insert((bet_id, option), payload);
    }

    pub fn set_tick(&self, tick: Option<TickInfo>) {
        self.state().tick = tick;
    }

    pub fn calls(&self, query: QueryType) -> usize {
        self.state().calls.get(&query).copied().unwrap_or(0)
    }
}

pub struct MockTransportBuilder {
    state: MockState,
}

impl MockTransportBuilder {
    pub fn with_active_bets(mut self, ids: &[u32]) -> Self {
        self.state.active_ids = Some(ids.to_vec());
        self
    }

    pub fn with_bet(mut self, layout: WireLayout, info: RawBetInfo) -> Self {
        self.state
            .bets
            .insert(info.bet_id, encode_bet_info(layout, &info));
        self
    }

    pub fn with_raw_bet(mut self, bet_id: u32, payload: Vec<u8>) -> Self {
        self.state.bets.insert(bet_id, payload);
        self
    }

    pub fn with_basic_info(mut self, payload: Vec<u8>) -> Self {
        self.state.basic_info = Some(payload);
        self
    }

    pub fn with_option_detail(mut self, bet_id: u32, option: u32, payload: Vec<u8>) -> Self {
        self.state.option_details.insert((bet_id, option), payload);
        self
    }

    pub fn with_creator_bets(mut self, creator: PublicKey, ids: &[u32]) -> Self {
        self.state.creator_bets.insert(creator, ids.to_vec());
        self
    }

    pub fn with_tick(mut self, tick: TickInfo) -> Self {
        self.state.tick = Some(tick);
        self
    }

    pub fn build(self) -> MockTransport {
        MockTransport {
            state: Mutex::new(self.state),
        }
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    async fn query(&self, query: QueryType, input: &[u8]) -> Result<Vec<u8>, NodeError> {
        let mut state = self.state();
        *state.calls.entry(query).or_insert(0) += 1;

        match query {
            QueryType::BasicInfo => state.basic_info.clone().ok_or_else(|| unavailable(query)),
            QueryType::ActiveBets => state
                .active_ids
                .as_deref()
                .map(encode_active_bet_ids)
                .ok_or_else(|| unavailable(query)),
            QueryType::BetInfo => {
                let bet_id = u32_at(input, 0).ok_or_else(|| unavailable("bet id input"))?;
                if state.failing_bets.contains(&bet_id) {
                    return Err(unavailable(format_args!("bet {bet_id}")));
                }
                state
                    .bets
                    .get(&bet_id)
                    .cloned()
                    .ok_or_else(|| unavailable(format_args!("bet {bet_id}")))
            }
            QueryType::BetOptionDetail => {
                let bet_id = u32_at(input, 0).ok_or_else(|| unavailable("bet id input"))?;
                let option = u32_at(input, 4).ok_or_else(|| unavailable("option input"))?;
                // Unknown pairs answer like the node does for an empty option.
                Ok(state
                    .option_details
                    .get(&(bet_id, option))
                    .cloned()
                    .unwrap_or_else(|| vec![0u8; 64]))
            }
            QueryType::BetsByCreator => {
                let creator: PublicKey = input
                    .try_into()
                    .map_err(|_| unavailable("creator key input"))?;
                let ids = state.creator_bets.get(&creator).cloned().unwrap_or_default();
                Ok(encode_active_bet_ids(&ids))
            }
        }
    }

    async fn tick_info(&self) -> Result<TickInfo, NodeError> {
        self.state().tick.ok_or_else(|| unavailable("tick info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::raw_bet_info;

    #[tokio::test]
    async fn setters_change_answers_between_calls() {
        let mock = MockTransport::builder().with_active_bets(&[1, 2]).build();
        assert_eq!(
            mock.query(QueryType::ActiveBets, &[]).await.expect("ids"),
            encode_active_bet_ids(&[1, 2])
        );

        mock.set_active_bets(None);
        assert!(mock.query(QueryType::ActiveBets, &[]).await.is_err());
        assert_eq!(mock.calls(QueryType::ActiveBets), 2);
    }

    #[tokio::test]
    async fn failing_bet_overrides_payload() {
        let mock = MockTransport::builder()
            .with_bet(WireLayout::Packed, raw_bet_info(4))
            .build();
        let input = 4u32.to_le_bytes();
        assert!(mock.query(QueryType::BetInfo, &input).await.is_ok());

        mock.fail_bet(4, true);
        assert!(mock.query(QueryType::BetInfo, &input).await.is_err());
        mock.fail_bet(4, false);
        assert!(mock.query(QueryType::BetInfo, &input).await.is_ok());
    }
}
