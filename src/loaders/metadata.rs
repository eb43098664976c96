use chrono::Utc;
use diesel::prelude::*;
use tracing::info;

use crate::archive::FetchedArchive;
use crate::config::SourceConfig;
use crate::database::{self, PgPool};
use crate::errors::Error;
use crate::models::DataSource;
use crate::schema;
use crate::sfga::{Archive, ArchiveMeta};

/// Writes the merged data-source row for one source.
///
/// The catalog descriptor wins for titles, urls, and flags when it has a
/// value; the archive supplies what the descriptor leaves empty plus the
/// DOI; the archive file name supplies version and revision date; the
/// record counts come from what actually landed in the warehouse.
pub fn load(
    pool: &PgPool,
    archive: &Archive,
    source: &SourceConfig,
    fetched: &FetchedArchive,
) -> Result<DataSource, Error> {
    let meta = archive.metadata()?.unwrap_or_default();

    let record_count = database::name_index_count(pool, source.id)?;
    let vernacular_record_count = database::vernacular_index_count(pool, source.id)?;

    let row = merge(source, &meta, fetched, record_count, vernacular_record_count);

    // delete+insert keeps the row idempotent without an upsert column list
    database::delete_data_source(pool, source.id)?;

    let mut conn = pool.get()?;
    diesel::insert_into(schema::data_sources::table).values(&row).execute(&mut conn)?;

    info!(
        source_id = source.id,
        records = record_count,
        vernaculars = vernacular_record_count,
        "data source metadata written"
    );

    Ok(row)
}

fn merge(
    source: &SourceConfig,
    meta: &ArchiveMeta,
    fetched: &FetchedArchive,
    record_count: i64,
    vernacular_record_count: i64,
) -> DataSource {
    let title = pick(&source.title, &meta.title);
    let description = pick(&source.description, &meta.description);

    DataSource {
        id: source.id,
        title,
        title_short: source.title_short.clone(),
        description,
        data_source_type: source.data_source_type.map(|t| t.as_str().to_string()).unwrap_or_default(),
        version: fetched.version(),
        revision_date: fetched.version(),
        doi: meta.doi.clone(),
        home_url: source.home_url.clone(),
        data_url: source.data_url.clone(),
        outlink_url: source.outlink_url.clone(),
        is_outlink_ready: source.is_outlink_ready,
        is_curated: source.is_curated,
        is_auto_curated: source.is_auto_curated,
        has_classification: source.has_classification,
        record_count,
        vernacular_record_count,
        updated_at: Utc::now(),
    }
}

fn pick(descriptor: &str, archive: &str) -> String {
    if descriptor.is_empty() {
        archive.to_string()
    }
    else {
        descriptor.to_string()
    }
}
