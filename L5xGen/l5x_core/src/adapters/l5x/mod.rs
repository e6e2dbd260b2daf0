mod backend;
pub mod reader;
pub mod templates;
pub mod writer;

pub use backend::L5xCodec;
pub use reader::{read_l5x, read_l5x_str};
pub use templates::{DirTemplates, EmbeddedTemplates};
pub use writer::{write_l5x, write_l5x_file, write_l5x_with, WriterOptions, CDATA_ELEMENTS};
