//! Acquisition history: deduplicated parameter sets, the append-only
//! instance log, and template inference over that history.

pub mod backend;
pub mod error;
pub mod memory;
pub mod params;
pub mod pattern;
pub mod sqlite;
pub mod template;

pub use backend::{ParamCount, ParamInsert, ProtocolCount, StoreBackend, StoredInstance};
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use params::{default_cutoff, IngestOutcome, ParameterStore, DEFAULT_LOOKBACK_DAYS};
pub use pattern::ProtocolPattern;
pub use sqlite::SqliteBackend;
pub use template::{Template, TemplateInferencer, TemplateTable};
