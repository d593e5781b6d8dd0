//! Event scanner: retrieves and decodes the governance events GovWatch
//! cares about. The trait is the seam the tracker and runner depend
//! on; the production implementation sits on the JSON-RPC client.

use async_trait::async_trait;
use std::collections::HashMap;

use govwatch_core::types::{BlockRange, NewAnswer, NewQuestion, ProposalCreated};
use govwatch_core::{GovWatchError, Result};

use crate::rpc::{LogData, RawLog, RpcClient, topic_to_address};

// keccak256 of the event signatures.
/// `ProposalQuestionCreated(bytes32 indexed questionId, string indexed proposalId)`
pub const PROPOSAL_QUESTION_CREATED_TOPIC: &str =
    "0xa1f5047031a658827550a2c4be07648493f3ac88a09c857b3961d1336429a31f";
/// `LogNewAnswer(bytes32 answer, bytes32 indexed question_id, bytes32 indexed history_hash,
///  address indexed user, uint256 bond, uint256 ts, bool is_commitment)`
pub const LOG_NEW_ANSWER_TOPIC: &str =
    "0xe47ca4ebbbc2990134d1168821f38c5e177f3d5ee564bffeadeaa351905e6221";
/// `LogNewQuestion(bytes32 indexed question_id, address indexed user, uint256 template_id,
///  string question, bytes32 indexed content_hash, address arbitrator, uint32 timeout,
///  uint32 opening_ts, uint256 nonce, uint256 created)`
pub const LOG_NEW_QUESTION_TOPIC: &str =
    "0xfe2dac156a3890636ce13f65f4fdf41dcaee11526e4a5374531572d92194796c";

/// Decoded domain events for a contract address and half-open block
/// window.
#[async_trait]
pub trait EventScanner: Send + Sync {
    async fn chain_head(&self) -> Result<u64>;

    async fn proposals_created(
        &self,
        module_address: &str,
        range: BlockRange,
    ) -> Result<Vec<ProposalCreated>>;

    async fn new_answers(&self, oracle_address: &str, range: BlockRange)
    -> Result<Vec<NewAnswer>>;

    async fn new_questions(
        &self,
        oracle_address: &str,
        range: BlockRange,
    ) -> Result<Vec<NewQuestion>>;
}

/// Scanner backed by an Ethereum JSON-RPC node.
pub struct RpcScanner {
    client: RpcClient,
}

impl RpcScanner {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventScanner for RpcScanner {
    async fn chain_head(&self) -> Result<u64> {
        self.client.block_number().await
    }

    async fn proposals_created(
        &self,
        module_address: &str,
        range: BlockRange,
    ) -> Result<Vec<ProposalCreated>> {
        let logs = self
            .client
            .get_logs(module_address, PROPOSAL_QUESTION_CREATED_TOPIC, range)
            .await?;

        // Proposals are rare; one timestamp lookup per distinct block.
        let mut timestamps = HashMap::new();
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if !timestamps.contains_key(&log.block_number) {
                let ts = self.client.block_timestamp(log.block_number).await?;
                timestamps.insert(log.block_number, ts);
            }
            events.push(decode_proposal_created(log, timestamps[&log.block_number])?);
        }
        Ok(events)
    }

    async fn new_answers(
        &self,
        oracle_address: &str,
        range: BlockRange,
    ) -> Result<Vec<NewAnswer>> {
        let logs = self
            .client
            .get_logs(oracle_address, LOG_NEW_ANSWER_TOPIC, range)
            .await?;
        logs.iter().map(decode_new_answer).collect()
    }

    async fn new_questions(
        &self,
        oracle_address: &str,
        range: BlockRange,
    ) -> Result<Vec<NewQuestion>> {
        let logs = self
            .client
            .get_logs(oracle_address, LOG_NEW_QUESTION_TOPIC, range)
            .await?;
        logs.iter().map(decode_new_question).collect()
    }
}

fn topic(log: &RawLog, index: usize) -> Result<&str> {
    log.topics
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| GovWatchError::Rpc(format!("log without topic {index}")))
}

/// Both parameters are indexed; the proposal id string reaches the log
/// only as its keccak hash, which is what gets persisted downstream.
pub fn decode_proposal_created(
    log: &RawLog,
    happened_at: chrono::DateTime<chrono::Utc>,
) -> Result<ProposalCreated> {
    Ok(ProposalCreated {
        question_id: topic(log, 1)?.to_string(),
        proposal_id: topic(log, 2)?.to_string(),
        tx_hash: log.tx_hash.clone(),
        block_number: log.block_number,
        happened_at,
    })
}

pub fn decode_new_answer(log: &RawLog) -> Result<NewAnswer> {
    let data = LogData::parse(&log.data)?;
    Ok(NewAnswer {
        question_id: topic(log, 1)?.to_string(),
        user: topic_to_address(topic(log, 3)?)?,
        answer: data.word_hex(0)?,
        bond: data.word_u128(1)?,
        ts: data.word_u64(2)?,
        tx_hash: log.tx_hash.clone(),
        block_number: log.block_number,
    })
}

pub fn decode_new_question(log: &RawLog) -> Result<NewQuestion> {
    let data = LogData::parse(&log.data)?;
    // Head words: template_id, question offset, arbitrator, timeout,
    // opening_ts, nonce, created.
    Ok(NewQuestion {
        question_id: topic(log, 1)?.to_string(),
        question: data.string_at(1)?,
        timeout: data.word_u64(3)?,
        opening_ts: data.word_u64(4)?,
        block_number: log.block_number,
    })
}
