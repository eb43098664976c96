use diesel::prelude::*;
use tracing::{info, warn};

use crate::database::PgPool;
use crate::errors::Error;
use crate::models::{string_uuid, NameString};
use crate::schema;
use crate::sfga::Archive;
use crate::utils::{new_progress_bar, CancelToken, EmptyNamesChoice, Prompter};

/// Two bind parameters per row; 30,000 rows keeps a statement safely under
/// the warehouse's 65,535 parameter cap.
pub const BATCH_SIZE: usize = 30_000;

#[derive(Debug, Default)]
pub struct NamesStats {
    pub seen: usize,
    pub inserted: usize,
    pub skipped_empty: usize,
}

pub enum NamesOutcome {
    Loaded(NamesStats),
    /// The operator answered "no" on the empty-name prompt.
    SkipSource,
}

/// Streams the archive's name strings into `name_strings`.
///
/// The parsed `gn__scientific_name_string` is preferred; the verbatim
/// `col__scientific_name` is the fallback. Ids are UUID v5 of the chosen
/// string, and `ON CONFLICT DO NOTHING` makes re-runs and cross-source
/// duplicates report zero new rows.
pub fn load(
    pool: &PgPool,
    archive: &Archive,
    source_id: i32,
    prompter: &dyn Prompter,
    cancel: &CancelToken,
) -> Result<NamesOutcome, Error> {
    let total = archive.name_count()?;
    let bar = new_progress_bar(total as usize, "Importing name strings");

    let mut conn = pool.get()?;
    let mut batch: Vec<NameString> = Vec::with_capacity(BATCH_SIZE);
    let mut stats = NamesStats::default();

    let mut prompted = false;
    let mut skip_source = false;
    let mut abort_run = false;
    let mut cancelled = false;

    archive.each_name_string(&mut |row| {
        if cancel.is_cancelled() {
            cancelled = true;
            return Ok(false);
        }

        stats.seen += 1;
        bar.inc(1);

        let preferred = row.parsed.trim();
        let chosen = if preferred.is_empty() {
            // the prompt fires once per source, on the first empty row
            if !prompted {
                prompted = true;
                match prompter.empty_names(source_id) {
                    EmptyNamesChoice::UseFallback => {}
                    EmptyNamesChoice::SkipSource => {
                        skip_source = true;
                        return Ok(false);
                    }
                    EmptyNamesChoice::AbortRun => {
                        abort_run = true;
                        return Ok(false);
                    }
                }
            }
            row.verbatim.trim()
        }
        else {
            preferred
        };

        // a row with no usable string at all has no identity to dedup on
        if chosen.is_empty() {
            stats.skipped_empty += 1;
            return Ok(true);
        }

        batch.push(NameString {
            id: string_uuid(chosen),
            name: chosen.to_string(),
        });

        if batch.len() >= BATCH_SIZE {
            stats.inserted += insert_batch(&mut conn, &batch)?;
            batch.clear();
        }

        Ok(true)
    })?;

    bar.finish();

    if cancelled {
        return Err(Error::Cancelled);
    }
    if abort_run {
        return Err(Error::Aborted);
    }
    if skip_source {
        info!(source_id, "source skipped on operator request");
        return Ok(NamesOutcome::SkipSource);
    }

    if !batch.is_empty() {
        stats.inserted += insert_batch(&mut conn, &batch)?;
    }

    if stats.skipped_empty > 0 {
        warn!(source_id, skipped = stats.skipped_empty, "rows without any name string were skipped");
    }
    info!(source_id, seen = stats.seen, inserted = stats.inserted, "name strings import finished");

    Ok(NamesOutcome::Loaded(stats))
}

fn insert_batch(conn: &mut PgConnection, batch: &[NameString]) -> Result<usize, Error> {
    use schema::name_strings::dsl::*;

    // rows-affected counts only genuinely new strings, a second run over
    // the same archive reports zero
    let inserted = diesel::insert_into(name_strings)
        .values(batch)
        .on_conflict(id)
        .do_nothing()
        .execute(conn)?;

    Ok(inserted)
}
