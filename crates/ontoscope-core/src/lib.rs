pub mod config;
pub mod dedup;
pub mod error;
pub mod formats;
pub mod identifiers;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod schema;

pub use config::AppConfig;
pub use dedup::{DedupKey, DedupOutcome, Deduplicator, Discarded, dedupe};
pub use error::{CoreError, Result};
pub use formats::ExportFormat;
pub use matcher::{RejectReason, Verdict, evaluate, matches};
pub use normalize::{DropReason, Normalized, normalize};
pub use pipeline::{Pipeline, PipelineReport, PipelineStats, SourceBatch};
pub use query::{AbsentYearPolicy, QuerySpec, Term, YearRange};
pub use record::{CanonicalRecord, RawRecord};
pub use schema::{FieldSpec, Provider, ProviderSchema};
