//! Compact channel identifier codec.
//!
//! A short channel id packs the funding transaction's location into 64 bits:
//!
//! ```text
//! | block height (24) | tx index in block (24) | output index (16) |
//! ```
//!
//! The human-readable form is `height:index:output`. Some literal contexts
//! of the graph store reject `:`, so batched writes use `x` instead.

use std::fmt;

use serde::{Deserialize, Serialize};

const HEIGHT_SHIFT: u32 = 40;
const INDEX_SHIFT: u32 = 16;
const INDEX_MASK: u64 = (1 << 24) - 1;
const OUTPUT_MASK: u64 = (1 << 16) - 1;

/// Separator of the human-readable form.
pub const SEPARATOR: char = ':';

/// Separator substituted for store-bound batch writes.
pub const STORE_SEPARATOR: char = 'x';

/// A compact 64-bit channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl ChannelId {
    pub fn block_height(self) -> u32 {
        (self.0 >> HEIGHT_SHIFT) as u32
    }

    pub fn block_index(self) -> u32 {
        ((self.0 >> INDEX_SHIFT) & INDEX_MASK) as u32
    }

    pub fn output_index(self) -> u16 {
        (self.0 & OUTPUT_MASK) as u16
    }

    /// Render as `height:index:output`.
    pub fn encode(self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.block_height(),
            self.block_index(),
            self.output_index()
        )
    }

    /// Render as `heightxindexxoutput`, the form used by batched writes.
    pub fn store_key(self) -> String {
        self.encode().replace(SEPARATOR, &STORE_SEPARATOR.to_string())
    }

    /// Both spellings under which this channel may be stored.
    ///
    /// Snapshot-file imports keep `:`, live pulls use `x`; match-only
    /// statements target either.
    pub fn store_keys(self) -> [String; 2] {
        [self.encode(), self.store_key()]
    }
}

impl From<u64> for ChannelId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Render a raw channel id as `height:index:output`.
pub fn encode(channel_id: u64) -> String {
    ChannelId(channel_id).encode()
}

/// Render a raw channel id in the `x`-separated store form.
pub fn store_key(channel_id: u64) -> String {
    ChannelId(channel_id).store_key()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: u64 = 0x0001_F400_000A_0001;

    #[test]
    fn test_encode_components() {
        let id = ChannelId(EXAMPLE);
        assert_eq!(id.block_height(), 500);
        assert_eq!(id.block_index(), 10);
        assert_eq!(id.output_index(), 1);
        assert_eq!(encode(EXAMPLE), "500:10:1");
    }

    #[test]
    fn test_components_rebuild_the_id() {
        let id = ChannelId(EXAMPLE);
        let parts: Vec<u64> = id
            .encode()
            .split(SEPARATOR)
            .map(|p| p.parse().unwrap())
            .collect();
        let rebuilt = (parts[0] << HEIGHT_SHIFT) | (parts[1] << INDEX_SHIFT) | parts[2];
        assert_eq!(rebuilt, EXAMPLE);
    }

    #[test]
    fn test_store_key_is_reversible() {
        let key = store_key(EXAMPLE);
        assert_eq!(key, "500x10x1");
        assert!(!key.contains(SEPARATOR));
        assert_eq!(key.replace(STORE_SEPARATOR, ":"), encode(EXAMPLE));
    }

    #[test]
    fn test_extremes() {
        assert_eq!(encode(0), "0:0:0");
        assert_eq!(encode(u64::MAX), "16777215:16777215:65535");
    }

    #[test]
    fn test_store_keys_and_display() {
        let id = ChannelId::from(EXAMPLE);
        assert_eq!(id.to_string(), "500:10:1");
        assert_eq!(id.store_keys(), ["500:10:1".to_string(), "500x10x1".to_string()]);
    }
}
