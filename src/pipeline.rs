use std::time::{Duration, Instant};

use semver::Version;
use tracing::{error, info, warn};

use crate::archive::ArchiveFetcher;
use crate::breadcrumbs::{self, Hierarchy};
use crate::config::{Config, SourceConfig};
use crate::database::{self, PgPool};
use crate::errors::{ConfigError, Error};
use crate::filters::SourceFilter;
use crate::hierarchy;
use crate::loaders::{indices, metadata, names, vernaculars};
use crate::sfga::Archive;
use crate::utils::{CancelToken, Prompter};

/// The per-source checkpoints, in execution order. A stage either completes
/// or ends the source; the label goes into logs and the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    VersionCheck,
    NameStrings,
    Hierarchy,
    Indices,
    Vernaculars,
    Metadata,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::VersionCheck => "version-check",
            Stage::NameStrings => "name-strings",
            Stage::Hierarchy => "hierarchy",
            Stage::Indices => "indices",
            Stage::Vernaculars => "vernaculars",
            Stage::Metadata => "metadata",
        }
    }
}

#[derive(Debug)]
pub enum SourceStatus {
    Succeeded,
    /// Skipped on operator request, neither a success nor a failure.
    Skipped,
    Failed { stage: Stage, error: String },
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: i32,
    pub label: String,
    pub status: SourceStatus,
    pub records: i64,
    pub vernaculars: i64,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<SourceOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.status, SourceStatus::Succeeded)).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.status, SourceStatus::Skipped)).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.status, SourceStatus::Failed { .. })).count()
    }
}

struct SourceReport {
    skipped: bool,
    records: i64,
    vernaculars: i64,
}

/// Runs the whole populate: source selection, then the per-source stage
/// sequence with failure isolation between sources.
pub struct Populator<'a> {
    config: &'a Config,
    pool: PgPool,
    prompter: &'a dyn Prompter,
    cancel: CancelToken,
}

impl<'a> Populator<'a> {
    pub fn new(config: &'a Config, pool: PgPool, prompter: &'a dyn Prompter, cancel: CancelToken) -> Populator<'a> {
        Populator {
            config,
            pool,
            prompter,
            cancel,
        }
    }

    pub fn run(&self, filter: Option<&SourceFilter>) -> Result<RunSummary, Error> {
        database::ping(&self.pool)?;
        breadcrumbs::reset_bad_nodes();

        let minimum = Version::parse(&self.config.populate.min_archive_version)
            .map_err(|_| ConfigError::MinVersion(self.config.populate.min_archive_version.clone()))?;

        let selected: Vec<&SourceConfig> = match filter {
            Some(filter) => filter.select(&self.config.sources),
            None => self.config.sources.iter().collect(),
        };

        if selected.is_empty() {
            let raw = filter.map(|f| f.raw().to_string()).unwrap_or_else(|| "all".to_string());
            return Err(Error::NoSources(raw));
        }

        info!(sources = selected.len(), "populate run started");

        let mut summary = RunSummary::default();

        for source in selected.iter() {
            let started = Instant::now();
            info!(source_id = source.id, label = source.label(), "populating source");

            match self.process_source(source, &minimum) {
                Ok(report) => {
                    let status = if report.skipped {
                        SourceStatus::Skipped
                    }
                    else {
                        SourceStatus::Succeeded
                    };
                    summary.outcomes.push(SourceOutcome {
                        source_id: source.id,
                        label: source.label(),
                        status,
                        records: report.records,
                        vernaculars: report.vernaculars,
                        elapsed: started.elapsed(),
                    });
                }

                Err((stage, err)) => {
                    error!(
                        source_id = source.id,
                        stage = stage.label(),
                        %err,
                        "source failed"
                    );
                    let fatal_for_run = matches!(err, Error::Cancelled | Error::Aborted);
                    summary.outcomes.push(SourceOutcome {
                        source_id: source.id,
                        label: source.label(),
                        status: SourceStatus::Failed {
                            stage,
                            error: err.to_string(),
                        },
                        records: 0,
                        vernaculars: 0,
                        elapsed: started.elapsed(),
                    });

                    // cancellation fails the current source and then ends
                    // the run; every other failure moves to the next source
                    if fatal_for_run {
                        self.log_summary(&summary);
                        return Err(err);
                    }
                }
            }
        }

        self.log_summary(&summary);

        if summary.failed() == selected.len() {
            return Err(Error::AllSourcesFailed(summary.failed()));
        }

        Ok(summary)
    }

    fn process_source(&self, source: &SourceConfig, minimum: &Version) -> Result<SourceReport, (Stage, Error)> {
        let fetcher = ArchiveFetcher::new(&self.config.cache_dir, self.prompter);
        let fetched = fetcher.fetch(source).map_err(|err| (Stage::Fetch, err))?;

        let archive = Archive::open(&fetched.sqlite_path).map_err(|err| (Stage::Fetch, err))?;
        archive.check_version(minimum).map_err(|err| (Stage::VersionCheck, err))?;

        let outcome = names::load(&self.pool, &archive, source.id, self.prompter, &self.cancel)
            .map_err(|err| (Stage::NameStrings, err))?;
        if let names::NamesOutcome::SkipSource = outcome {
            return Ok(SourceReport {
                skipped: true,
                records: 0,
                vernaculars: 0,
            });
        }

        // best-effort: a broken hierarchy degrades to flat classification
        let tree = match hierarchy::build(&archive, self.config.populate.concurrent_jobs, &self.cancel) {
            Ok(map) => map,
            Err(err @ (Error::Cancelled | Error::Aborted)) => return Err((Stage::Hierarchy, err)),
            Err(err) => {
                warn!(source_id = source.id, %err, "hierarchy build failed, falling back to flat classification");
                Hierarchy::new()
            }
        };

        let builder = indices::RowBuilder {
            source_id: source.id,
            outlink: source.outlink_column(),
            prefer_flat: self.config.populate.prefer_flat_classification,
        };
        indices::load(
            &self.pool,
            &archive,
            &builder,
            &tree,
            self.config.populate.batch_size,
            &self.cancel,
        )
        .map_err(|err| (Stage::Indices, err))?;

        // missing vernaculars never block a source
        if let Err(err) = vernaculars::load(
            &self.pool,
            &archive,
            source.id,
            self.config.populate.batch_size,
            &self.cancel,
        ) {
            if matches!(err, Error::Cancelled | Error::Aborted) {
                return Err((Stage::Vernaculars, err));
            }
            warn!(source_id = source.id, %err, "vernacular import failed, continuing to metadata");
        }

        let row = metadata::load(&self.pool, &archive, source, &fetched).map_err(|err| (Stage::Metadata, err))?;

        // the extracted file stays in the cache for post-mortems; only the
        // handle is released here
        if let Err(err) = archive.close() {
            warn!(source_id = source.id, %err, "closing the archive handle failed");
        }

        Ok(SourceReport {
            skipped: false,
            records: row.record_count,
            vernaculars: row.vernacular_record_count,
        })
    }

    fn log_summary(&self, summary: &RunSummary) {
        for outcome in &summary.outcomes {
            match &outcome.status {
                SourceStatus::Succeeded => info!(
                    source_id = outcome.source_id,
                    label = outcome.label,
                    records = outcome.records,
                    vernaculars = outcome.vernaculars,
                    elapsed = ?outcome.elapsed,
                    "source populated"
                ),
                SourceStatus::Skipped => info!(source_id = outcome.source_id, label = outcome.label, "source skipped"),
                SourceStatus::Failed { stage, error } => error!(
                    source_id = outcome.source_id,
                    label = outcome.label,
                    stage = stage.label(),
                    error,
                    "source failed"
                ),
            }
        }

        info!(
            succeeded = summary.succeeded(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "populate run finished"
        );
    }
}
