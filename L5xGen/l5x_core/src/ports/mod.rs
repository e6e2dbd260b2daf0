pub mod codec;
pub mod template;

pub use codec::ProjectCodec;
pub use template::TemplateSource;
