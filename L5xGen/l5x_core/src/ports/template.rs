use serde_json::Value;

use crate::error::L5xResult;

/// Default meta data supplier for newly constructed objects.
/// The crate only consumes templates; where they live (embedded, on disk) is an adapter concern.
pub trait TemplateSource {
    /// Load template `path` (e.g. `_tag.L5X`) and return its `key` entry, or the whole document
    /// when `key` is `None`. Missing files or keys are configuration errors.
    fn load_template(&self, path: &str, key: Option<&str>) -> L5xResult<Value>;
}

impl<T: TemplateSource + ?Sized> TemplateSource for &T {
    fn load_template(&self, path: &str, key: Option<&str>) -> L5xResult<Value> {
        (**self).load_template(path, key)
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for Box<T> {
    fn load_template(&self, path: &str, key: Option<&str>) -> L5xResult<Value> {
        (**self).load_template(path, key)
    }
}
