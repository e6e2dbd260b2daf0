use anyhow::Result;
use serde_json::Value;

use crate::ports::ProjectCodec;

use super::reader::read_l5x_str;
use super::writer::{write_l5x_with, WriterOptions};

/// quick-xml backed `.L5X` codec.
#[derive(Debug, Clone, Default)]
pub struct L5xCodec {
    options: WriterOptions,
}

impl L5xCodec {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }
}

impl ProjectCodec for L5xCodec {
    fn decode(&self, text: &str) -> Result<Value> {
        read_l5x_str(text)
    }

    fn encode(&self, document: &Value) -> Result<String> {
        write_l5x_with(document, &self.options)
    }

    fn extension(&self) -> &'static str {
        "L5X"
    }
}
