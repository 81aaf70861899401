//! Quottery node client.
//!
//! Defines the [`NodeTransport`] trait (raw contract queries) with an HTTP
//! RPC implementation ([`HttpRpcTransport`]), a direct TCP implementation
//! ([`TcpTransport`]) and a test mock (`mock::MockTransport`). [`NodeClient`]
//! sits on top and turns raw payloads into domain records.

mod connection;
mod http_adapter;
#[cfg(test)]
pub mod mock;
mod tcp_adapter;

pub use connection::{Endpoint, NodeAddress, DEFAULT_TCP_PORT};
pub use http_adapter::HttpRpcTransport;
pub use tcp_adapter::TcpTransport;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::codec::{self, RawOptionDetail, WireLayout};
use crate::error::{CoreError, NodeError};
use crate::identity::{IdentityCodec, QubicIdentityCodec};
use crate::types::{BetInfo, NodeBasicInfo, OptionParticipants, Oracle, TickInfo};

/// Contract index of Quottery on the node.
pub const QUOTTERY_CONTRACT_INDEX: u32 = 2;

/// Contract function selector (`inputType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    BasicInfo,
    BetInfo,
    BetOptionDetail,
    ActiveBets,
    BetsByCreator,
}

impl QueryType {
    pub fn input_type(self) -> u16 {
        match self {
            Self::BasicInfo => 1,
            Self::BetInfo => 2,
            Self::BetOptionDetail => 3,
            Self::ActiveBets => 4,
            Self::BetsByCreator => 5,
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BasicInfo => "GetBasicInfo",
            Self::BetInfo => "GetBetInfo",
            Self::BetOptionDetail => "GetBetOptionDetail",
            Self::ActiveBets => "GetActiveBet",
            Self::BetsByCreator => "GetBetByCreator",
        };
        f.write_str(name)
    }
}

/// Raw request/response access to the contract.
///
/// Implementations handle framing and connection management; decoding the
/// returned bytes is left to [`NodeClient`].
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Run one contract function and return its output bytes.
    async fn query(&self, query: QueryType, input: &[u8]) -> Result<Vec<u8>, NodeError>;

    async fn tick_info(&self) -> Result<TickInfo, NodeError>;
}

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// `http(s)://` gateway URL or `tcp://host[:port]`.
    pub connection: String,
    /// Overrides the layout implied by the connection scheme.
    pub layout: Option<WireLayout>,
    pub requests_per_second: Option<u32>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            connection: "https://rpc.qubic.org".to_owned(),
            layout: None,
            requests_per_second: None,
        }
    }
}

// ==============================================================================
// Client
// ==============================================================================

/// Typed access to the Quottery contract over any [`NodeTransport`].
///
/// Every operation logs its failure at `warn` and hands it back; nothing
/// here retries or panics.
#[derive(Clone)]
pub struct NodeClient {
    transport: Arc<dyn NodeTransport>,
    layout: WireLayout,
    identities: Arc<dyn IdentityCodec>,
    address: NodeAddress,
}

impl NodeClient {
    pub fn new(transport: Arc<dyn NodeTransport>, layout: WireLayout, address: NodeAddress) -> Self {
        Self {
            transport,
            layout,
            identities: Arc::new(QubicIdentityCodec),
            address,
        }
    }

    /// Build the transport named by `config.connection`.
    pub fn connect(config: &NodeConfig) -> Result<Self, CoreError> {
        let endpoint = connection::parse_connection(&config.connection)?;
        let layout = config.layout.unwrap_or_else(|| endpoint.default_layout());
        let address = endpoint.address();
        let transport: Arc<dyn NodeTransport> = match &endpoint {
            Endpoint::Http { base, .. } => {
                Arc::new(HttpRpcTransport::new(base, config.requests_per_second)?)
            }
            Endpoint::Tcp { host, port } => Arc::new(TcpTransport::new(host.clone(), *port)),
        };
        debug!(node = %address, %layout, "node client configured");
        Ok(Self::new(transport, layout, address))
    }

    pub fn layout(&self) -> WireLayout {
        self.layout
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub async fn get_basic_info(&self) -> Result<NodeBasicInfo, NodeError> {
        logged(QueryType::BasicInfo, None, self.fetch_basic_info().await)
    }

    pub async fn get_active_bet_ids(&self) -> Result<Vec<u32>, NodeError> {
        logged(QueryType::ActiveBets, None, self.fetch_bet_ids(QueryType::ActiveBets, &[]).await)
    }

    pub async fn get_bet_info(&self, bet_id: u32) -> Result<BetInfo, NodeError> {
        logged(QueryType::BetInfo, Some(bet_id), self.fetch_bet_info(bet_id).await)
    }

    /// Participants of one option. An all-zero answer means the node has
    /// nothing recorded yet and comes back as [`NodeError::NoData`].
    pub async fn get_bet_option_detail(
        &self,
        bet_id: u32,
        option: u32,
    ) -> Result<OptionParticipants, NodeError> {
        logged(
            QueryType::BetOptionDetail,
            Some(bet_id),
            self.fetch_option_detail(bet_id, option).await,
        )
    }

    /// Ids of every bet issued by `creator`, active or not.
    pub async fn get_bets_by_creator(&self, creator: &str) -> Result<Vec<u32>, NodeError> {
        let result = match self.identities.pubkey_for_identity(creator) {
            Ok(pubkey) => self.fetch_bet_ids(QueryType::BetsByCreator, &pubkey).await,
            Err(e) => Err(e.into()),
        };
        logged(QueryType::BetsByCreator, None, result)
    }

    pub async fn get_tick_info(&self) -> Result<TickInfo, NodeError> {
        let result = self.transport.tick_info().await;
        if let Err(e) = &result {
            warn!(status = e.status(), error = %e, "tick info request failed");
        }
        result
    }

    async fn fetch_basic_info(&self) -> Result<NodeBasicInfo, NodeError> {
        let buf = self.transport.query(QueryType::BasicInfo, &[]).await?;
        let raw = codec::decode_basic_info(&buf)?;
        Ok(NodeBasicInfo {
            fee_per_slot_per_hour: raw.fee_per_slot_per_hour,
            game_operator_fee: raw.game_operator_fee,
            shareholders_fee: raw.shareholders_fee,
            min_amount_per_slot: raw.min_amount_per_slot,
            burn_fee: raw.burn_fee,
            issued_bets: raw.issued_bets,
            money_flow: raw.money_flow,
            money_flow_through_issue_bet: raw.money_flow_through_issue_bet,
            money_flow_through_join_bet: raw.money_flow_through_join_bet,
            money_flow_through_finalize_bet: raw.money_flow_through_finalize_bet,
            shareholders_earned_amount: raw.shareholders_earned_amount,
            shareholders_paid_amount: raw.shareholders_paid_amount,
            winners_earned_amount: raw.winners_earned_amount,
            distributed_amount: raw.distributed_amount,
            burned_amount: raw.burned_amount,
            game_operator: self.identities.identity_for_pubkey(&raw.game_operator),
        })
    }

    async fn fetch_bet_ids(&self, query: QueryType, input: &[u8]) -> Result<Vec<u32>, NodeError> {
        let buf = self.transport.query(query, input).await?;
        Ok(codec::decode_active_bet_ids(&buf)?)
    }

    async fn fetch_bet_info(&self, bet_id: u32) -> Result<BetInfo, NodeError> {
        let input = codec::encode_bet_id_request(bet_id);
        let buf = self.transport.query(QueryType::BetInfo, &input).await?;
        let raw = codec::decode_bet_info(self.layout, &buf)?;
        Ok(BetInfo {
            // The node echoes the id it was asked for; trust the request.
            bet_id,
            no_options: raw.no_options,
            creator: self.identities.identity_for_pubkey(&raw.creator),
            description: raw.description,
            option_descriptions: raw.option_descriptions,
            oracles: raw
                .oracles
                .iter()
                .map(|o| Oracle {
                    identity: self.identities.identity_for_pubkey(&o.pubkey),
                    fee_percent: o.fee_percent,
                })
                .collect(),
            oracle_votes: raw.oracle_votes,
            open: raw.open,
            close: raw.close,
            end: raw.end,
            amount_per_slot: raw.amount_per_slot,
            max_slots_per_option: raw.max_slots_per_option,
            slot_state: raw.slot_state,
        })
    }

    async fn fetch_option_detail(
        &self,
        bet_id: u32,
        option: u32,
    ) -> Result<OptionParticipants, NodeError> {
        let input = codec::encode_option_detail_request(bet_id, option);
        let buf = self.transport.query(QueryType::BetOptionDetail, &input).await?;
        match codec::decode_option_detail(&buf) {
            RawOptionDetail::NoData => Err(NodeError::NoData),
            RawOptionDetail::Bettors(bettors) => Ok(bettors
                .iter()
                .map(|(key, slots)| (self.identities.identity_for_pubkey(key), *slots))
                .collect()),
        }
    }
}

fn logged<T>(
    query: QueryType,
    bet_id: Option<u32>,
    result: Result<T, NodeError>,
) -> Result<T, NodeError> {
    match &result {
        Err(NodeError::NoData) => {
            debug!(rpc.input_type = query.input_type(), ?bet_id, "{query}: no data yet");
        }
        Err(e) => {
            warn!(
                rpc.input_type = query.input_type(),
                ?bet_id,
                status = e.status(),
                error = %e,
                "{query} failed"
            );
        }
        Ok(_) => {}
    }
    result
}
