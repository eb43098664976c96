use diesel::prelude::*;
use tracing::info;

use crate::database::{self, PgPool};
use crate::errors::Error;
use crate::models::{string_uuid, VernacularString, VernacularStringIndex};
use crate::schema;
use crate::sfga::{Archive, VernacularRow};
use crate::utils::{new_progress_bar, truncate_bytes, truncate_chars, CancelToken};

/// Vernacular names are capped at 500 bytes before their identity is
/// computed, so over-long strings still dedup stably.
const NAME_BYTE_LIMIT: usize = 500;
const LANGUAGE_CHAR_LIMIT: usize = 255;
const LOCALITY_CHAR_LIMIT: usize = 255;
const COUNTRY_CHAR_LIMIT: usize = 50;

/// Same parameter arithmetic as the name-strings loader: two binds per row.
const STRINGS_BATCH_SIZE: usize = 30_000;

#[derive(Debug, Default)]
pub struct VernacularStats {
    pub strings_seen: usize,
    pub strings_inserted: usize,
    pub indices: usize,
}

/// Loads vernacular strings and their per-source index rows.
///
/// The strings phase dedups across sources with `ON CONFLICT DO NOTHING`;
/// the indices phase is delete+bulk-copy like the name indices. A failure
/// here is non-fatal for the source; the caller logs and moves on to
/// metadata.
pub fn load(
    pool: &PgPool,
    archive: &Archive,
    source_id: i32,
    batch_size: usize,
    cancel: &CancelToken,
) -> Result<VernacularStats, Error> {
    let mut stats = VernacularStats::default();
    let mut conn = pool.get()?;

    let names = archive.vernacular_strings()?;
    stats.strings_seen = names.len();

    for chunk in names.chunks(STRINGS_BATCH_SIZE) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let rows: Vec<VernacularString> = chunk
            .iter()
            .map(|name| {
                let name = truncate_bytes(name, NAME_BYTE_LIMIT);
                VernacularString {
                    id: string_uuid(name),
                    name: name.to_string(),
                }
            })
            .collect();

        stats.strings_inserted += {
            use schema::vernacular_strings::dsl::*;
            diesel::insert_into(vernacular_strings)
                .values(&rows)
                .on_conflict(id)
                .do_nothing()
                .execute(&mut conn)?
        };
    }

    database::delete_vernacular_indices(pool, source_id)?;

    let bar = new_progress_bar(archive.vernacular_count()? as usize, "Importing vernacular indices");
    let mut batch: Vec<VernacularStringIndex> = Vec::with_capacity(batch_size);
    let mut cancelled = false;

    archive.each_vernacular(&mut |row| {
        if cancel.is_cancelled() {
            cancelled = true;
            return Ok(false);
        }
        bar.inc(1);

        if let Some(index) = index_row(source_id, &row) {
            batch.push(index);
        }

        if batch.len() >= batch_size {
            stats.indices += copy_batch(&mut conn, &mut batch, batch_size)?;
        }
        Ok(true)
    })?;

    stats.indices += copy_batch(&mut conn, &mut batch, batch_size)?;
    bar.finish();

    if cancelled {
        return Err(Error::Cancelled);
    }

    info!(
        source_id,
        strings = stats.strings_seen,
        inserted = stats.strings_inserted,
        indices = stats.indices,
        "vernacular import finished"
    );

    Ok(stats)
}

/// One vernacular index row. Rows without a name or a taxon reference
/// carry nothing to index; overflowing text columns are cut to their
/// character budgets with a trailing ellipsis.
fn index_row(source_id: i32, row: &VernacularRow) -> Option<VernacularStringIndex> {
    if row.name.trim().is_empty() || row.taxon_id.is_empty() {
        return None;
    }

    Some(VernacularStringIndex {
        data_source_id: source_id,
        record_id: row.taxon_id.clone(),
        vernacular_string_id: string_uuid(truncate_bytes(&row.name, NAME_BYTE_LIMIT)),
        language: truncate_chars(&row.language, LANGUAGE_CHAR_LIMIT),
        // the archive schema carries neither of these yet
        lang_code: String::new(),
        locality: truncate_chars(&row.locality, LOCALITY_CHAR_LIMIT),
        country_code: truncate_chars(&row.country, COUNTRY_CHAR_LIMIT),
        preferred: false,
    })
}

fn copy_batch(
    conn: &mut PgConnection,
    batch: &mut Vec<VernacularStringIndex>,
    capacity: usize,
) -> Result<usize, Error> {
    if batch.is_empty() {
        return Ok(0);
    }

    let rows = std::mem::replace(batch, Vec::with_capacity(capacity));
    let copied = diesel::copy_from(schema::vernacular_string_indices::table)
        .from_insertable(rows)
        .execute(conn)?;
    Ok(copied)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_an_index_row() {
        let row = VernacularRow {
            taxon_id: "t1".into(),
            name: "prickly rose".into(),
            language: "English".into(),
            locality: "Canada".into(),
            country: "CA".into(),
        };

        let index = index_row(42, &row).unwrap();
        assert_eq!(index.data_source_id, 42);
        assert_eq!(index.record_id, "t1");
        assert_eq!(index.vernacular_string_id, string_uuid("prickly rose"));
        assert_eq!(index.language, "English");
        assert_eq!(index.lang_code, "");
        assert_eq!(index.country_code, "CA");
        assert!(!index.preferred);
    }

    #[test]
    fn nameless_or_unanchored_rows_are_dropped() {
        let row = VernacularRow {
            taxon_id: "t1".into(),
            name: "  ".into(),
            ..VernacularRow::default()
        };
        assert!(index_row(42, &row).is_none());

        let row = VernacularRow {
            taxon_id: String::new(),
            name: "rose".into(),
            ..VernacularRow::default()
        };
        assert!(index_row(42, &row).is_none());
    }

    #[test]
    fn overflowing_columns_get_an_ellipsis() {
        let row = VernacularRow {
            taxon_id: "t1".into(),
            name: "rose".into(),
            language: "x".repeat(300),
            locality: "y".repeat(300),
            country: "z".repeat(60),
        };

        let index = index_row(42, &row).unwrap();
        assert_eq!(index.language.chars().count(), 255);
        assert!(index.language.ends_with('…'));
        assert_eq!(index.locality.chars().count(), 255);
        assert_eq!(index.country_code.chars().count(), 50);
        assert!(index.country_code.ends_with('…'));
    }

    #[test]
    fn the_string_identity_uses_the_truncated_name() {
        let long_name = "á".repeat(600);
        let row = VernacularRow {
            taxon_id: "t1".into(),
            name: long_name.clone(),
            ..VernacularRow::default()
        };

        let index = index_row(42, &row).unwrap();
        assert_eq!(index.vernacular_string_id, string_uuid(truncate_bytes(&long_name, 500)));
    }
}
