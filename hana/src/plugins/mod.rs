// Built-in stages: loading, writing and the stock document transforms

mod front_matter;
mod ignore;
mod loader;
mod metadata;
mod writer;

pub use front_matter::{split_front_matter, FrontMatter};
pub use ignore::Ignore;
pub use loader::FileLoader;
pub use metadata::Metadata;
pub use writer::FileWriter;
