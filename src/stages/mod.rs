//! Stock stages for common document enrichment.
//!
//! None of these are required by the pipeline itself; register the ones you
//! need with [`Pipeline::stage`](crate::pipeline::runtime::Pipeline::stage).

pub mod analyze;
pub mod hash;
pub mod mime;
pub mod size;
pub mod validate;

pub use analyze::ContentAnalyzer;
pub use hash::ContentHasher;
pub use mime::MimeSniffer;
pub use size::SizeMetrics;
pub use validate::Validator;

pub const CONTENT_HASH: &str = "content_hash";
pub const MIME_TYPE: &str = "mime_type";
pub const SIZE_BYTES: &str = "size_bytes";
pub const SIZE_KB: &str = "size_kb";
pub const WORD_COUNT: &str = "word_count";
pub const VALIDATION_ERROR: &str = "validation_error";
pub const SIZE_WARNING: &str = "size_warning";
pub const MIME_WARNING: &str = "mime_warning";
