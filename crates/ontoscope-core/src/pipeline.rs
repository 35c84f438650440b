//! Normalize → match → dedupe over one or more provider batches.
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::dedup::{Deduplicator, Discarded, Insertion};
use crate::matcher::{RejectReason, evaluate};
use crate::normalize::{DropReason, Normalized, normalize};
use crate::query::QuerySpec;
use crate::record::{CanonicalRecord, RawRecord};
use crate::schema::{Provider, ProviderSchema};

/// Raw records from one provider, with the schema that reads them.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub schema: ProviderSchema,
    pub records: Vec<RawRecord>,
}

impl SourceBatch {
    pub fn new(provider: Provider, records: Vec<RawRecord>) -> Self {
        Self {
            schema: ProviderSchema::for_provider(provider),
            records,
        }
    }

    pub fn with_schema(schema: ProviderSchema, records: Vec<RawRecord>) -> Self {
        Self { schema, records }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub raw: usize,
    pub dropped: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub duplicates: usize,
    pub kept: usize,
}

impl PipelineStats {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_for(&self, reason: RejectReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub records: Vec<CanonicalRecord>,
    pub discarded: Vec<Discarded>,
    pub stats: PipelineStats,
}

pub struct Pipeline {
    spec: QuerySpec,
}

impl Pipeline {
    pub fn new(spec: QuerySpec) -> Self {
        Self { spec }
    }

    /// Batches are consumed in order; within a batch, provider order is kept.
    pub fn run<I>(&self, batches: I) -> PipelineReport
    where
        I: IntoIterator<Item = SourceBatch>,
    {
        let mut stats = PipelineStats::default();
        let mut dedup = Deduplicator::new();

        for batch in batches {
            let provider = batch.schema.provider;
            let before = stats.clone();
            for raw in batch.records {
                stats.raw += 1;
                let record = match normalize(raw, &batch.schema) {
                    Normalized::Record(record) => record,
                    Normalized::Dropped(reason) => {
                        stats.dropped += 1;
                        log_drop(provider, reason);
                        continue;
                    }
                };

                let verdict = evaluate(&record, &self.spec);
                if let Some(reason) = verdict.reject_reason() {
                    debug!(%provider, title = %record.title, ?verdict, "record rejected");
                    *stats.rejected.entry(reason).or_default() += 1;
                    continue;
                }

                if let Insertion::Duplicate { kept_index } = dedup.insert(record) {
                    stats.duplicates += 1;
                    debug!(%provider, kept_index, "duplicate discarded");
                }
            }

            info!(
                %provider,
                raw = stats.raw - before.raw,
                dropped = stats.dropped - before.dropped,
                rejected = stats.rejected_total() - before.rejected_total(),
                duplicates = stats.duplicates - before.duplicates,
                "batch processed"
            );
        }

        let outcome = dedup.finish();
        stats.kept = outcome.unique.len();
        info!(
            raw = stats.raw,
            dropped = stats.dropped,
            rejected = stats.rejected_total(),
            duplicates = stats.duplicates,
            kept = stats.kept,
            "pipeline finished"
        );

        PipelineReport {
            records: outcome.unique,
            discarded: outcome.discarded,
            stats,
        }
    }
}

fn log_drop(provider: Provider, reason: DropReason) {
    debug!(%provider, reason = reason.as_str(), "record dropped during normalization");
}
