//! JSON shapes of the REST graph subscription.
//!
//! Each streamed line is either `{"result": GraphTopologyUpdate}` or
//! `{"error": {...}}`. 64-bit integers arrive as decimal strings.
//!
//! Events are decoded one at a time: a malformed event is logged and
//! dropped without taking its siblings or the subscription with it.

use anyhow::{anyhow, Result};
use lnstream_core::snapshot::{parse_amount, NodeAddress, SnapshotPolicy};
use lnstream_core::{
    ChannelCloseUpdate, ChannelEdgeUpdate, ChannelId, NodeUpdate, StreamError, StreamResult,
    TopologyUpdate,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<WireStatus>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// A topology message with its events still undecoded.
#[derive(Debug, Default, Deserialize)]
pub struct WireTopologyUpdate {
    #[serde(default)]
    pub node_updates: Vec<Value>,
    #[serde(default)]
    pub channel_updates: Vec<Value>,
    #[serde(default)]
    pub closed_chans: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireNodeUpdate {
    #[serde(default)]
    pub identity_key: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub node_addresses: Vec<NodeAddress>,
    /// Older gateways only send bare address strings.
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireChannelUpdate {
    pub chan_id: String,
    #[serde(default)]
    pub chan_point: Value,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub routing_policy: Option<SnapshotPolicy>,
    #[serde(default)]
    pub advertising_node: String,
    #[serde(default)]
    pub connecting_node: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireClosedChannel {
    pub chan_id: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub closed_height: u32,
    #[serde(default)]
    pub chan_point: Value,
}

/// Render a channel point given either as a string or as
/// `{funding_txid_str, output_index}`.
fn chan_point_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let txid = map
                .get("funding_txid_str")
                .or_else(|| map.get("funding_txid_bytes"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let index = map.get("output_index").and_then(Value::as_u64).unwrap_or(0);
            if txid.is_empty() {
                String::new()
            } else {
                format!("{}:{}", txid, index)
            }
        }
        _ => String::new(),
    }
}

fn parse_channel_id(raw: &str) -> StreamResult<ChannelId> {
    raw.trim()
        .parse::<u64>()
        .map(ChannelId)
        .map_err(|e| StreamError::invalid_record(format!("chan_id '{}': {}", raw, e)))
}

impl WireNodeUpdate {
    pub fn to_update(&self) -> NodeUpdate {
        let addresses = if self.node_addresses.is_empty() {
            self.addresses.clone()
        } else {
            self.node_addresses.iter().map(|a| a.addr.clone()).collect()
        };
        NodeUpdate {
            identity_key: self.identity_key.clone(),
            alias: self.alias.clone(),
            addresses,
            color: self.color.clone(),
        }
    }
}

impl WireChannelUpdate {
    pub fn to_update(&self) -> StreamResult<ChannelEdgeUpdate> {
        Ok(ChannelEdgeUpdate {
            channel_id: parse_channel_id(&self.chan_id)?,
            chan_point: chan_point_string(&self.chan_point),
            capacity: parse_amount("capacity", &self.capacity)?,
            routing_policy: self
                .routing_policy
                .as_ref()
                .ok_or_else(|| {
                    StreamError::invalid_record(format!("chan_id '{}': no routing policy", self.chan_id))
                })?
                .to_routing_policy()?,
            advertising_node: self.advertising_node.clone(),
            connecting_node: self.connecting_node.clone(),
        })
    }
}

impl WireClosedChannel {
    pub fn to_update(&self) -> StreamResult<ChannelCloseUpdate> {
        Ok(ChannelCloseUpdate {
            channel_id: parse_channel_id(&self.chan_id)?,
            chan_point: chan_point_string(&self.chan_point),
            capacity: parse_amount("capacity", &self.capacity)?,
            closed_height: self.closed_height,
        })
    }
}

fn decode_events<T, U>(
    kind: &'static str,
    raw: Vec<Value>,
    convert: impl Fn(T) -> StreamResult<U>,
) -> Vec<U>
where
    T: DeserializeOwned,
{
    raw.into_iter()
        .filter_map(|value| {
            let decoded = serde_json::from_value::<T>(value)
                .map_err(StreamError::from)
                .and_then(&convert);
            match decoded {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(kind, error = %e, "Skipping malformed topology event");
                    None
                }
            }
        })
        .collect()
}

impl WireTopologyUpdate {
    pub fn into_update(self) -> TopologyUpdate {
        TopologyUpdate {
            node_updates: decode_events("node", self.node_updates, |u: WireNodeUpdate| Ok(u.to_update())),
            channel_edge_updates: decode_events("edge", self.channel_updates, |u: WireChannelUpdate| {
                u.to_update()
            }),
            channel_close_updates: decode_events("close", self.closed_chans, |u: WireClosedChannel| {
                u.to_update()
            }),
        }
    }
}

/// Decode one line of the subscription stream.
///
/// Only an `error` envelope is an error. Blank or undecodable lines
/// yield `Ok(None)`; malformed events inside a message are dropped.
pub fn parse_stream_line(line: &[u8]) -> Result<Option<TopologyUpdate>> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let envelope: Envelope = match serde_json::from_slice(trimmed) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Skipping undecodable graph subscription line");
            return Ok(None);
        }
    };

    if let Some(status) = envelope.error {
        return Err(anyhow!(
            "graph subscription error (code {}): {}",
            status.code,
            status.message
        ));
    }

    let Some(result) = envelope.result else {
        warn!("Graph subscription message has neither result nor error");
        return Ok(None);
    };
    match serde_json::from_value::<WireTopologyUpdate>(result) {
        Ok(update) => Ok(Some(update.into_update())),
        Err(e) => {
            warn!(error = %e, "Skipping malformed graph subscription message");
            Ok(None)
        }
    }
}

/// Splits a byte stream into newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// Whatever is left once the stream ends without a final newline.
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(self.pending)
        }
    }
}
