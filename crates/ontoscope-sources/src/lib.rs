pub mod credentials;
pub mod error;
pub mod http;
pub mod query;
pub mod sources;

pub use credentials::Credentials;
pub use error::{Result, SourceError};
pub use http::{RateLimitedClient, RetryPolicy};
pub use sources::{FetchOutcome, RecordSource, build_sources, fetch_all};
