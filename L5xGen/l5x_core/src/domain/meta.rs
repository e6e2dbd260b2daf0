use serde_json::Value;

use super::tree::{self, Meta};
use super::validation::validate_name;
use crate::error::L5xResult;

pub const KEY_NAME: &str = "@Name";
pub const KEY_DESCRIPTION: &str = "Description";

/// Typed view over one raw tree node.
///
/// Reads and writes go through the wrapped node; keys the view never touches survive
/// re-serialization untouched.
pub trait TreeObject {
    /// Canonical L5X key order for this element.
    const KEY_ORDER: &'static [&'static str];

    fn meta(&self) -> &Meta;
    fn meta_mut(&mut self) -> &mut Meta;

    fn name(&self) -> &str {
        tree::attr(self.meta(), KEY_NAME)
            .or_else(|| tree::attr(self.meta(), "Name"))
            .unwrap_or("")
    }

    fn set_name(&mut self, name: &str) -> L5xResult<()> {
        validate_name("name", name)?;
        tree::set_attr(self.meta_mut(), KEY_NAME, name);
        Ok(())
    }

    fn description(&self) -> &str {
        tree::attr(self.meta(), KEY_DESCRIPTION).unwrap_or("")
    }

    fn set_description(&mut self, description: &str) {
        tree::set_attr(self.meta_mut(), KEY_DESCRIPTION, description);
    }

    fn init_dict_order(&mut self) {
        tree::init_dict_order(self.meta_mut(), Self::KEY_ORDER);
    }

    fn attr(&self, key: &str) -> Option<&str> {
        tree::attr(self.meta(), key)
    }

    /// Full node for serialization. Containers override this to write their typed
    /// children back into the lifted lists.
    fn meta_data(&self) -> Value {
        Value::Object(self.meta().clone())
    }
}
