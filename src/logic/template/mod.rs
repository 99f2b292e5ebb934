//! Template Store - Enrolled identity persistence
//!
//! - `types` - Template record, decay policy, public summary
//! - `store` - Encrypted per-identity envelopes with atomic writes

pub mod store;
pub mod types;

pub use store::TemplateStore;
pub use types::{DecayPolicy, TemplateRecord, TemplateSummary};
