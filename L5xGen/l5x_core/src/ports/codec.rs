use anyhow::Result;
use serde_json::Value;

/// Project file codec port.
/// The crate works on the raw tree; the on-disk format is an adapter concern.
pub trait ProjectCodec {
    /// Parse project text into the raw tree.
    fn decode(&self, text: &str) -> Result<Value>;
    /// Serialize a raw tree document.
    fn encode(&self, document: &Value) -> Result<String>;
    /// File extension written by this codec, e.g. `L5X`.
    fn extension(&self) -> &'static str;
}
