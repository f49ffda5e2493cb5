//! Secondary search sink and the denormalized projection written to it.
//!
//! Everything here is best-effort from the owning job's perspective: a
//! search-side failure is logged and skipped, never allowed to block the
//! primary sink.

pub mod base;
pub mod memory;
pub mod projection;

pub use base::{FieldKind, FieldMapping, IndexSchema, SearchDocument, SearchSink};
pub use memory::MemorySearchSink;
pub use projection::{Projection, ProjectionField, format_duration, project, strip_markup};
