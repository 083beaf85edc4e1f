use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db;
use crate::enrich::{EnrichTables, Outcome};
use crate::error::{CategoryError, RenderError, SnapshotError};
use crate::extract::{self, RawEntity};
use crate::registry::{Category, CategorySpec, Registry};
use crate::render::RenderHost;
use crate::report::{CategoryOutcome, CategoryReport, RunReport, SkipReason, SkippedEntity};
use crate::snapshot;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub ready_timeout: Duration,
    pub render_timeout: Duration,
    /// Total render attempts per entity, first try included.
    pub render_attempts: u32,
    pub retry_delay: Duration,
    pub data_dir: PathBuf,
}

/// Drives the render host through every category, one entity at a time.
pub struct Ingestor<'a, H: RenderHost> {
    host: &'a mut H,
    conn: &'a Connection,
    registry: &'a Registry,
    tables: &'a EnrichTables,
    options: &'a IngestOptions,
    cancel: CancellationToken,
}

impl<'a, H: RenderHost> Ingestor<'a, H> {
    pub fn new(
        host: &'a mut H,
        conn: &'a Connection,
        registry: &'a Registry,
        tables: &'a EnrichTables,
        options: &'a IngestOptions,
        cancel: CancellationToken,
    ) -> Self {
        Ingestor { host, conn, registry, tables, options, cancel }
    }

    /// Ingest `plan` (category names) in the given order. Category failures are
    /// recorded in the report; they never stop the remaining categories.
    pub async fn run(&mut self, plan: &[String]) -> RunReport {
        let mut report = RunReport::default();

        for name in plan {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            info!("Processing category: {}", name);

            let mut cat_report = CategoryReport::new(name);
            if let Err(e) = self.run_category(name, &mut cat_report, &mut report.skipped).await {
                error!(category = %name, "category aborted: {}", e);
                cat_report.outcome = CategoryOutcome::Aborted(e.to_string());
            }
            if cat_report.outcome == CategoryOutcome::Cancelled {
                report.cancelled = true;
            }
            info!(
                category = %name,
                "{} persisted, {} skipped, {} retries",
                cat_report.persisted, cat_report.skipped, cat_report.retries
            );
            report.categories.push(cat_report);
        }

        report.finished_at = Some(chrono::Local::now());
        report
    }

    async fn run_category(
        &mut self,
        name: &str,
        stats: &mut CategoryReport,
        skipped: &mut Vec<SkippedEntity>,
    ) -> Result<(), CategoryError> {
        let category: Category = name.parse()?;
        let registry = self.registry;
        let spec = registry.spec(category)?;

        self.host
            .select_category(category)
            .await
            .map_err(|source| host_error(category, "select", source))?;
        self.host
            .wait_data_ready(category, self.options.ready_timeout)
            .await
            .map_err(|source| CategoryError::NotReady { category: name.to_string(), source })?;
        if let Err(e) = self.host.sort_by_id(category).await {
            // ids still get persisted correctly, only the visiting order suffers
            warn!(category = %name, "could not sort dataset by id: {}", e);
        }
        let count = self
            .host
            .count(category)
            .await
            .map_err(|source| host_error(category, "count", source))?;
        stats.total = count;

        let pb = progress_bar(count);
        for index in 0..count {
            if self.cancel.is_cancelled() {
                stats.outcome = CategoryOutcome::Cancelled;
                break;
            }
            if let Err(reason) = self.ingest_one(spec, index, stats).await {
                warn!(category = %name, index, "skipped: {}", reason.reason);
                stats.skipped += 1;
                skipped.push(reason);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(())
    }

    /// Render → extract → enrich → persist/skip → snapshot for one index.
    async fn ingest_one(
        &mut self,
        spec: &CategorySpec,
        index: usize,
        stats: &mut CategoryReport,
    ) -> Result<(), SkippedEntity> {
        let category = spec.category;
        let skip = |id: Option<String>, reason: SkipReason| SkippedEntity {
            category: category.to_string(),
            index,
            id,
            reason,
        };

        let raw = self
            .render_with_retry(spec, index, stats)
            .await
            .map_err(|reason| skip(None, reason))?;
        let entity = extract::project(&raw, &spec.fields)
            .ok_or_else(|| skip(None, SkipReason::MissingId))?;
        let id = entity.id().clone().coerce();

        let persisted = match self.tables.enrich(category, entity) {
            Outcome::Persist(normalized) => db::upsert(self.conn, spec, &normalized)
                .map_err(|e| SkipReason::Persist(e.to_string())),
            Outcome::Skip(why) => Err(SkipReason::Enrichment(why)),
        };

        // the overlay still shows this entity; capture it whatever the row outcome
        match self.capture(category, &id).await {
            Ok(()) => stats.snapshots += 1,
            Err(e) => {
                warn!(category = %category, index, "snapshot failed for id {}: {}", id, e);
                stats.snapshot_failures += 1;
            }
        }

        match persisted {
            Ok(()) => {
                stats.persisted += 1;
                debug!(category = %category, index, "rendered entity {}/{}", index + 1, stats.total);
                Ok(())
            }
            Err(reason) => Err(skip(Some(id.to_string()), reason)),
        }
    }

    async fn render_with_retry(
        &mut self,
        spec: &CategorySpec,
        index: usize,
        stats: &mut CategoryReport,
    ) -> Result<RawEntity, SkipReason> {
        let attempts = self.options.render_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match self
                .host
                .render_entity(spec.category, index, &spec.fields, self.options.render_timeout)
                .await
            {
                Ok(raw) => return Ok(raw),
                Err(e) => e,
            };

            if attempt >= attempts || !err.is_retryable() {
                return Err(exhausted(attempt, err));
            }
            warn!(
                category = %spec.category,
                index,
                "render attempt {}/{} failed, retrying: {}",
                attempt, attempts, err
            );
            stats.retries += 1;
            attempt += 1;
            tokio::time::sleep(self.options.retry_delay).await;
        }
    }

    async fn capture(&mut self, category: Category, id: &Value) -> Result<(), SnapshotError> {
        let path = snapshot::path(&self.options.data_dir, category, id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|source| SnapshotError::Io { path: dir.to_path_buf(), source })?;
        }
        self.host.snapshot(category, &path).await?;
        Ok(())
    }
}

fn exhausted(attempts: u32, err: RenderError) -> SkipReason {
    SkipReason::RenderExhausted { attempts, last_error: err.to_string() }
}

fn host_error(category: Category, op: &'static str, source: RenderError) -> CategoryError {
    CategoryError::Host { category: category.to_string(), op, source }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
