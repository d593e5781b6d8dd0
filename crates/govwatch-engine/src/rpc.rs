//! Thin Ethereum JSON-RPC client plus the hex/ABI decoding helpers the
//! scanner needs. Only the handful of read methods the engine uses are
//! wrapped.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::time::Duration;

use govwatch_core::types::BlockRange;
use govwatch_core::{GovWatchError, Result};

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

fn rpc_err(msg: impl Into<String>) -> GovWatchError {
    GovWatchError::Rpc(msg.into())
}

/// A raw, undecoded log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub tx_hash: String,
}

pub struct RpcClient {
    url: String,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .timeout(RPC_TIMEOUT)
            .send()
            .await
            .map_err(|e| rpc_err(format!("{method} request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(rpc_err(format!("{method} HTTP {}", resp.status())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| rpc_err(format!("{method} invalid response: {e}")))?;

        if let Some(error) = body.get("error") {
            return Err(rpc_err(format!("{method} error: {error}")));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| rpc_err(format!("{method} response without result")))
    }

    /// Latest block height.
    pub async fn block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        hex_to_u64(result.as_str().ok_or_else(|| rpc_err("non-string block number"))?)
    }

    /// Timestamp of a block.
    pub async fn block_timestamp(&self, block: u64) -> Result<DateTime<Utc>> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("{block:#x}"), false]),
            )
            .await?;
        let ts = result
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| rpc_err(format!("block {block} without timestamp")))?;
        let secs = hex_to_u64(ts)?;
        DateTime::from_timestamp(secs as i64, 0)
            .ok_or_else(|| rpc_err(format!("block {block} timestamp out of range")))
    }

    /// Logs for a contract and topic0 over a half-open window. The RPC
    /// takes inclusive bounds, hence the `to - 1`.
    pub async fn get_logs(
        &self,
        address: &str,
        topic0: &str,
        range: BlockRange,
    ) -> Result<Vec<RawLog>> {
        let result = self
            .call(
                "eth_getLogs",
                json!([{
                    "address": address,
                    "topics": [topic0],
                    "fromBlock": format!("{:#x}", range.from),
                    "toBlock": format!("{:#x}", range.to - 1),
                }]),
            )
            .await?;

        result
            .as_array()
            .ok_or_else(|| rpc_err("eth_getLogs returned a non-array"))?
            .iter()
            .map(parse_raw_log)
            .collect()
    }

    /// Read-only contract call; returns the raw hex result.
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String> {
        let result = self
            .call("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| rpc_err("eth_call returned a non-string"))
    }
}

pub(crate) fn parse_raw_log(log: &Value) -> Result<RawLog> {
    let field = |name: &str| -> Result<&str> {
        log.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| rpc_err(format!("log without {name}")))
    };

    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| rpc_err("log without topics"))?
        .iter()
        .map(|t| {
            t.as_str()
                .map(str::to_string)
                .ok_or_else(|| rpc_err("non-string topic"))
        })
        .collect::<Result<Vec<String>>>()?;

    Ok(RawLog {
        topics,
        data: field("data")?.to_string(),
        block_number: hex_to_u64(field("blockNumber")?)?,
        tx_hash: field("transactionHash")?.to_string(),
    })
}

/// Parse a 0x-prefixed hex quantity into u64.
pub fn hex_to_u64(input: &str) -> Result<u64> {
    let digits = input
        .strip_prefix("0x")
        .ok_or_else(|| rpc_err(format!("quantity without 0x prefix: {input}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| rpc_err(format!("bad quantity {input}: {e}")))
}

/// ABI-encoded event data: a sequence of 32-byte words with dynamic
/// values referenced by byte offsets.
pub struct LogData {
    bytes: Vec<u8>,
}

impl LogData {
    pub fn parse(data: &str) -> Result<Self> {
        let digits = data
            .strip_prefix("0x")
            .ok_or_else(|| rpc_err("data without 0x prefix"))?;
        let bytes = hex::decode(digits).map_err(|e| rpc_err(format!("bad data hex: {e}")))?;
        Ok(Self { bytes })
    }

    fn word(&self, index: usize) -> Result<&[u8]> {
        let start = index * 32;
        self.bytes
            .get(start..start + 32)
            .ok_or_else(|| rpc_err(format!("data too short for word {index}")))
    }

    /// Word as a 0x-prefixed 32-byte hex string (bytes32 values).
    pub fn word_hex(&self, index: usize) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.word(index)?)))
    }

    pub fn word_u64(&self, index: usize) -> Result<u64> {
        let value = self.word_u128(index)?;
        u64::try_from(value).map_err(|_| rpc_err(format!("word {index} exceeds u64")))
    }

    pub fn word_u128(&self, index: usize) -> Result<u128> {
        let word = self.word(index)?;
        if word[..16].iter().any(|&b| b != 0) {
            return Err(rpc_err(format!("word {index} exceeds u128")));
        }
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(buf))
    }

    /// Dynamic string whose byte offset lives in the given head word.
    /// Offsets and lengths come straight off the log; all arithmetic
    /// on them is checked.
    pub fn string_at(&self, offset_word: usize) -> Result<String> {
        let offset = self.word_u64(offset_word)? as usize;
        let content_start = offset
            .checked_add(32)
            .ok_or_else(|| rpc_err("string offset past end of data"))?;
        let len_word = self
            .bytes
            .get(offset..content_start)
            .ok_or_else(|| rpc_err("string offset past end of data"))?;
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&len_word[16..]);
        let len = u128::from_be_bytes(buf) as usize;
        let content_end = content_start
            .checked_add(len)
            .ok_or_else(|| rpc_err("string content past end of data"))?;
        let content = self
            .bytes
            .get(content_start..content_end)
            .ok_or_else(|| rpc_err("string content past end of data"))?;
        String::from_utf8(content.to_vec()).map_err(|e| rpc_err(format!("non-UTF8 string: {e}")))
    }
}

/// Extract the address packed into a 32-byte topic.
pub fn topic_to_address(topic: &str) -> Result<String> {
    let digits = topic
        .strip_prefix("0x")
        .ok_or_else(|| rpc_err(format!("topic without 0x prefix: {topic}")))?;
    if digits.len() != 64 {
        return Err(rpc_err(format!("topic with unexpected length: {topic}")));
    }
    Ok(format!("0x{}", &digits[24..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(hex_to_u64("0x0").unwrap(), 0);
        assert_eq!(hex_to_u64("0x64").unwrap(), 100);
        assert!(hex_to_u64("64").is_err());
        assert!(hex_to_u64("0xzz").is_err());
    }

    #[test]
    fn decodes_words_and_strings() {
        // Two head words (a uint and a string offset at byte 64),
        // then the string "abc".
        let data = format!(
            "0x{:064x}{:064x}{:064x}{}",
            42u32,
            64u32,
            3u32,
            format!("{:0<64}", hex::encode("abc")),
        );
        let decoded = LogData::parse(&data).unwrap();
        assert_eq!(decoded.word_u64(0).unwrap(), 42);
        assert_eq!(decoded.string_at(1).unwrap(), "abc");
    }

    #[test]
    fn rejects_truncated_data() {
        let decoded = LogData::parse("0x00").unwrap();
        assert!(decoded.word_u64(0).is_err());
    }

    #[test]
    fn rejects_a_string_offset_overflowing_usize() {
        // A single head word holding u64::MAX as the string offset.
        let data = format!("0x{:064x}", u64::MAX);
        let decoded = LogData::parse(&data).unwrap();
        assert!(decoded.string_at(0).is_err());
    }

    #[test]
    fn rejects_a_string_length_overflowing_usize() {
        // Offset points at a length word claiming u64::MAX bytes.
        let data = format!("0x{:064x}{:064x}", 32u32, u64::MAX);
        let decoded = LogData::parse(&data).unwrap();
        assert!(decoded.string_at(0).is_err());
    }

    #[test]
    fn extracts_address_from_topic() {
        let topic = "0x000000000000000000000000a62d2a75eb39c12e908e9f6bf50f189641692f2e";
        assert_eq!(
            topic_to_address(topic).unwrap(),
            "0xa62d2a75eb39c12e908e9f6bf50f189641692f2e"
        );
        assert!(topic_to_address("0x1234").is_err());
    }
}
