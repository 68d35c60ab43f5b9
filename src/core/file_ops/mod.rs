pub mod paths;
pub mod rewrite;
pub mod sources;

pub use paths::{safe_join, write_entry};
pub use rewrite::{create_archive, rewrite_archive, SafeRewrite};
pub use sources::{collect_sources, SourceFile};
