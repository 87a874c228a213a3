//! Run report: distribution plus run accounting, compared against the
//! pool's designed weights.

use super::FrequencyAggregator;
use crate::models::{
    Distribution, FailureCounts, PoolDefinition, ProbeError, Result, RunStatus, SampleRun,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// One label's observed vs designed share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    pub count: u64,
    /// count / collected (0.0 - 1.0)
    pub observed_share: f64,
    /// Designed share, if the catalog carries weights for this label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_share: Option<f64>,
    /// observed - expected, in percentage points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_pp: Option<f64>,
}

/// Final report of a sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub pool: String,
    pub status: RunStatus,
    pub target: u64,
    pub batch_size: u32,
    pub collected: u64,
    pub batches_issued: u64,
    pub batches_succeeded: u64,
    pub failures: FailureCounts,
    pub runtime_secs: f64,
    /// Sorted by count descending, then label
    pub rows: Vec<ReportRow>,
    /// Raw ids missing from the catalog
    pub unmapped: Vec<String>,
    pub distribution: Distribution,
}

impl SampleReport {
    /// Aggregate a finished run and compare it to the pool's weights.
    pub fn build(
        run: &SampleRun,
        pool: &PoolDefinition,
        started_at: DateTime<Utc>,
        runtime: Duration,
    ) -> Self {
        let distribution = FrequencyAggregator::aggregate(run.outcomes(), pool);
        let unmapped = FrequencyAggregator::unmapped(run.outcomes(), pool)
            .into_iter()
            .collect();
        let rows = Self::rows(&distribution, pool, run.collected());

        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            pool: run.pool().to_string(),
            status: run.status(),
            target: run.target(),
            batch_size: run.batch_size(),
            collected: run.collected(),
            batches_issued: run.batches_issued(),
            batches_succeeded: run.batches_succeeded(),
            failures: run.failures(),
            runtime_secs: runtime.as_secs_f64(),
            rows,
            unmapped,
            distribution,
        }
    }

    /// Observed labels plus designed labels that never showed up.
    fn rows(distribution: &Distribution, pool: &PoolDefinition, collected: u64) -> Vec<ReportRow> {
        let expected = pool.expected_shares();
        let share = |count: u64| {
            if collected == 0 {
                0.0
            } else {
                count as f64 / collected as f64
            }
        };

        let mut rows: Vec<ReportRow> = distribution
            .iter()
            .map(|(label, count)| (label.to_string(), count))
            .chain(
                expected
                    .keys()
                    .filter(|label| distribution.get(label) == 0)
                    .map(|label| (label.clone(), 0)),
            )
            .map(|(label, count)| {
                let observed_share = share(count);
                let expected_share = expected.get(&label).copied();
                ReportRow {
                    deviation_pp: expected_share.map(|e| (observed_share - e) * 100.0),
                    label,
                    count,
                    observed_share,
                    expected_share,
                }
            })
            .collect();

        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        rows
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Sampling Run ({}) ===", self.status);
        println!("Pool:        {}", self.pool);
        println!("Target:      {}", self.target);
        println!("Collected:   {}", self.collected);
        println!(
            "Batches:     {}/{} ok (size {})",
            self.batches_succeeded, self.batches_issued, self.batch_size
        );
        println!(
            "Failed:      {} (transport {}, rejected {}, malformed {})",
            self.failures.total(),
            self.failures.transport,
            self.failures.rejected,
            self.failures.malformed
        );
        println!("Runtime:     {:.1}s", self.runtime_secs);

        if self.rows.is_empty() {
            println!("\nNo outcomes collected.");
            return;
        }

        let width = self
            .rows
            .iter()
            .map(|r| r.label.chars().count())
            .max()
            .unwrap_or(5)
            .max(5);

        println!();
        println!(
            "{:<width$}  {:>8}  {:>9}  {:>9}  {:>8}",
            "Label", "Count", "Observed", "Expected", "Delta"
        );
        for row in &self.rows {
            let expected = row
                .expected_share
                .map(|e| format!("{:.3}%", e * 100.0))
                .unwrap_or_else(|| "-".to_string());
            let delta = row
                .deviation_pp
                .map(|d| format!("{d:+.3}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<width$}  {:>8}  {:>8.3}%  {:>9}  {:>8}",
                row.label,
                row.count,
                row.observed_share * 100.0,
                expected,
                delta
            );
        }

        if !self.unmapped.is_empty() {
            println!("\nUnmapped ids: {}", self.unmapped.join(", "));
        }
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ProbeError::io("creating report directory", e))?;
        }

        let file = File::create(path).map_err(|e| ProbeError::io("creating report file", e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer).map_err(|e| ProbeError::io("writing report", e))?;
        writer
            .flush()
            .map_err(|e| ProbeError::io("flushing report", e))?;
        Ok(())
    }
}
