use diesel::prelude::*;
use tracing::info;

use crate::breadcrumbs::{self, Hierarchy};
use crate::database::{self, PgPool};
use crate::errors::Error;
use crate::models::{code_id, string_uuid, NameStringIndex};
use crate::outlink::OutlinkColumn;
use crate::schema;
use crate::sfga::{Archive, BareNameRecord, SynonymRecord, TaxonRecord};
use crate::utils::{new_progress_bar, new_spinner_totals, CancelToken};

/// Record-id prefix for names referenced by neither taxa nor synonyms.
pub const BARE_NAME_PREFIX: &str = "bare-name-";

#[derive(Debug, Default)]
pub struct IndicesStats {
    pub taxa: usize,
    pub synonyms: usize,
    pub bare_names: usize,
    pub skipped_empty: usize,
}

impl IndicesStats {
    pub fn total(&self) -> usize {
        self.taxa + self.synonyms + self.bare_names
    }
}

/// Turns archive records into fourteen-column index rows. Pure value
/// construction; the bulk loading happens in [`load`].
pub struct RowBuilder {
    pub source_id: i32,
    pub outlink: Option<OutlinkColumn>,
    pub prefer_flat: bool,
}

impl RowBuilder {
    fn taxon_row(&self, record: &TaxonRecord, hierarchy: &Hierarchy) -> Option<NameStringIndex> {
        let chosen = pick_name(&record.parsed_name, &record.verbatim_name)?;
        let crumbs = breadcrumbs::resolve(&record.taxon_id, hierarchy, &record.flat, self.prefer_flat);

        Some(NameStringIndex {
            data_source_id: self.source_id,
            record_id: record.taxon_id.clone(),
            name_string_id: string_uuid(chosen),
            outlink_id: self.outlink_id(&record.outlink_value),
            global_id: record.global_id.clone(),
            name_id: record.name_id.clone(),
            local_id: record.local_id.clone(),
            code_id: code_id(&record.code),
            rank: record.rank.to_lowercase(),
            taxonomic_status: record.status.to_lowercase(),
            // an accepted taxon is its own accepted record
            accepted_record_id: record.taxon_id.clone(),
            classification: crumbs.names,
            classification_ids: crumbs.ids,
            classification_ranks: crumbs.ranks,
        })
    }

    fn synonym_row(&self, record: &SynonymRecord, hierarchy: &Hierarchy) -> Option<NameStringIndex> {
        let chosen = pick_name(&record.parsed_name, &record.verbatim_name)?;
        // the classification belongs to the accepted taxon, not the synonym
        let crumbs = breadcrumbs::resolve(&record.taxon_id, hierarchy, &record.flat, self.prefer_flat);

        let status = if record.status.is_empty() {
            "synonym".to_string()
        }
        else {
            record.status.to_lowercase()
        };

        Some(NameStringIndex {
            data_source_id: self.source_id,
            record_id: record.synonym_id.clone(),
            name_string_id: string_uuid(chosen),
            outlink_id: self.outlink_id(&record.outlink_value),
            global_id: record.global_id.clone(),
            name_id: record.name_id.clone(),
            local_id: record.local_id.clone(),
            code_id: code_id(&record.code),
            rank: record.rank.to_lowercase(),
            taxonomic_status: status,
            accepted_record_id: record.taxon_id.clone(),
            classification: crumbs.names,
            classification_ids: crumbs.ids,
            classification_ranks: crumbs.ranks,
        })
    }

    fn bare_name_row(&self, record: &BareNameRecord) -> Option<NameStringIndex> {
        let chosen = pick_name(&record.parsed_name, &record.verbatim_name)?;
        let record_id = format!("{BARE_NAME_PREFIX}{}", record.name_id);

        Some(NameStringIndex {
            data_source_id: self.source_id,
            record_id: record_id.clone(),
            name_string_id: string_uuid(chosen),
            outlink_id: self.outlink_id(&record.outlink_value),
            global_id: record.global_id.clone(),
            name_id: record.name_id.clone(),
            local_id: record.local_id.clone(),
            code_id: code_id(&record.code),
            rank: record.rank.to_lowercase(),
            taxonomic_status: "bare name".to_string(),
            accepted_record_id: record_id,
            classification: String::new(),
            classification_ids: String::new(),
            classification_ranks: String::new(),
        })
    }

    fn outlink_id(&self, raw: &str) -> String {
        match &self.outlink {
            Some(column) => column.extract(raw),
            None => String::new(),
        }
    }
}

/// Builds and bulk-loads the full name-string index of one source:
/// accepted taxa, synonyms, then bare names. The source's old rows are
/// deleted first so a re-run lands on identical state.
pub fn load(
    pool: &PgPool,
    archive: &Archive,
    builder: &RowBuilder,
    hierarchy: &Hierarchy,
    batch_size: usize,
    cancel: &CancelToken,
) -> Result<IndicesStats, Error> {
    database::delete_name_indices(pool, builder.source_id)?;

    let mut conn = pool.get()?;
    let mut stats = IndicesStats::default();
    let mut cancelled = false;

    {
        let bar = new_progress_bar(archive.taxon_count()? as usize, "Importing taxa");
        let mut batch = Vec::with_capacity(batch_size);

        archive.each_taxon_record(builder.outlink.as_ref(), &mut |record| {
            if cancel.is_cancelled() {
                cancelled = true;
                return Ok(false);
            }
            bar.inc(1);

            match builder.taxon_row(&record, hierarchy) {
                Some(row) => batch.push(row),
                None => stats.skipped_empty += 1,
            }
            if batch.len() >= batch_size {
                stats.taxa += copy_batch(&mut conn, &mut batch, batch_size)?;
            }
            Ok(true)
        })?;

        stats.taxa += copy_batch(&mut conn, &mut batch, batch_size)?;
        bar.finish();
    }

    if !cancelled {
        let bar = new_progress_bar(archive.synonym_count()? as usize, "Importing synonyms");
        let mut batch = Vec::with_capacity(batch_size);

        archive.each_synonym_record(builder.outlink.as_ref(), &mut |record| {
            if cancel.is_cancelled() {
                cancelled = true;
                return Ok(false);
            }
            bar.inc(1);

            match builder.synonym_row(&record, hierarchy) {
                Some(row) => batch.push(row),
                None => stats.skipped_empty += 1,
            }
            if batch.len() >= batch_size {
                stats.synonyms += copy_batch(&mut conn, &mut batch, batch_size)?;
            }
            Ok(true)
        })?;

        stats.synonyms += copy_batch(&mut conn, &mut batch, batch_size)?;
        bar.finish();
    }

    if !cancelled {
        let bar = new_spinner_totals("Importing bare names");
        let mut batch = Vec::with_capacity(batch_size);

        archive.each_bare_name(builder.outlink.as_ref(), &mut |record| {
            if cancel.is_cancelled() {
                cancelled = true;
                return Ok(false);
            }
            bar.inc(1);

            match builder.bare_name_row(&record) {
                Some(row) => batch.push(row),
                None => stats.skipped_empty += 1,
            }
            if batch.len() >= batch_size {
                stats.bare_names += copy_batch(&mut conn, &mut batch, batch_size)?;
            }
            Ok(true)
        })?;

        stats.bare_names += copy_batch(&mut conn, &mut batch, batch_size)?;
        bar.finish();
    }

    if cancelled {
        return Err(Error::Cancelled);
    }

    info!(
        source_id = builder.source_id,
        taxa = stats.taxa,
        synonyms = stats.synonyms,
        bare_names = stats.bare_names,
        "name string indices import finished"
    );

    Ok(stats)
}

/// The name the record is indexed under: the parsed string when present,
/// the verbatim one otherwise. Rows with neither carry nothing to index.
fn pick_name<'a>(parsed: &'a str, verbatim: &'a str) -> Option<&'a str> {
    let parsed = parsed.trim();
    if !parsed.is_empty() {
        return Some(parsed);
    }
    let verbatim = verbatim.trim();
    if verbatim.is_empty() {
        None
    }
    else {
        Some(verbatim)
    }
}

/// Streams a full batch through the warehouse's binary copy path and hands
/// back a fresh pre-allocated buffer.
fn copy_batch(conn: &mut PgConnection, batch: &mut Vec<NameStringIndex>, capacity: usize) -> Result<usize, Error> {
    if batch.is_empty() {
        return Ok(0);
    }

    let rows = std::mem::replace(batch, Vec::with_capacity(capacity));
    let copied = diesel::copy_from(schema::name_string_indices::table)
        .from_insertable(rows)
        .execute(conn)?;
    Ok(copied)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::breadcrumbs::{FlatEntry, Node};

    fn builder(outlink: Option<&str>, prefer_flat: bool) -> RowBuilder {
        RowBuilder {
            source_id: 11,
            outlink: outlink.map(|selector| OutlinkColumn::parse(selector).unwrap()),
            prefer_flat,
        }
    }

    fn hierarchy() -> Hierarchy {
        let nodes = vec![
            Node {
                id: "k".into(),
                parent_id: String::new(),
                rank: "kingdom".into(),
                canonical_name: "Plantae".into(),
                taxonomic_status: "accepted".into(),
            },
            Node {
                id: "t1".into(),
                parent_id: "k".into(),
                rank: "species".into(),
                canonical_name: "Rosa acicularis".into(),
                taxonomic_status: "accepted".into(),
            },
        ];
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect()
    }

    #[test]
    fn taxon_rows_are_self_accepted() {
        let record = TaxonRecord {
            taxon_id: "t1".into(),
            name_id: "n1".into(),
            status: "ACCEPTED".into(),
            parsed_name: "Rosa acicularis Lindl.".into(),
            verbatim_name: "Rosa acicularis".into(),
            rank: "SPECIES".into(),
            code: "botanical".into(),
            ..TaxonRecord::default()
        };

        let row = builder(None, false).taxon_row(&record, &hierarchy()).unwrap();
        assert_eq!(row.data_source_id, 11);
        assert_eq!(row.record_id, "t1");
        assert_eq!(row.accepted_record_id, "t1");
        assert_eq!(row.name_string_id, string_uuid("Rosa acicularis Lindl."));
        assert_eq!(row.rank, "species");
        assert_eq!(row.taxonomic_status, "accepted");
        assert_eq!(row.code_id, 2);
        assert_eq!(row.classification, "Plantae|Rosa acicularis");
        assert_eq!(row.classification_ranks, "kingdom|species");
        assert_eq!(row.classification_ids, "k|t1");
    }

    #[test]
    fn taxon_rows_fall_back_to_the_verbatim_name() {
        let record = TaxonRecord {
            taxon_id: "t1".into(),
            parsed_name: "  ".into(),
            verbatim_name: "Rosa acicularis".into(),
            ..TaxonRecord::default()
        };

        let row = builder(None, false).taxon_row(&record, &Hierarchy::new()).unwrap();
        assert_eq!(row.name_string_id, string_uuid("Rosa acicularis"));
    }

    #[test]
    fn nameless_records_are_skipped() {
        let record = TaxonRecord::default();
        assert!(builder(None, false).taxon_row(&record, &Hierarchy::new()).is_none());
    }

    #[test]
    fn synonym_rows_point_at_their_accepted_taxon() {
        let record = SynonymRecord {
            synonym_id: "syn9".into(),
            taxon_id: "t1".into(),
            status: String::new(),
            name_id: "n2".into(),
            parsed_name: "Rosa canina".into(),
            ..SynonymRecord::default()
        };

        let row = builder(None, false).synonym_row(&record, &hierarchy()).unwrap();
        assert_eq!(row.record_id, "syn9");
        assert_eq!(row.accepted_record_id, "t1");
        // empty archive status defaults to synonym
        assert_eq!(row.taxonomic_status, "synonym");
        // classification is the accepted taxon's
        assert_eq!(row.classification, "Plantae|Rosa acicularis");
    }

    #[test]
    fn bare_name_rows_have_no_classification() {
        let record = BareNameRecord {
            name_id: "n7".into(),
            verbatim_name: "Homo sapiens".into(),
            code: "zoological".into(),
            ..BareNameRecord::default()
        };

        let row = builder(None, false).bare_name_row(&record).unwrap();
        assert_eq!(row.record_id, "bare-name-n7");
        assert_eq!(row.accepted_record_id, "bare-name-n7");
        assert_eq!(row.taxonomic_status, "bare name");
        assert_eq!(row.code_id, 1);
        assert_eq!(row.classification, "");
        assert_eq!(row.classification_ids, "");
        assert_eq!(row.classification_ranks, "");
    }

    #[test]
    fn outlink_extraction_applies_to_alternative_ids() {
        let record = TaxonRecord {
            taxon_id: "t1".into(),
            verbatim_name: "Rosa acicularis".into(),
            outlink_value: "wikidata:Q123,gnoutlink:Rosa_acicularis".into(),
            ..TaxonRecord::default()
        };

        let row = builder(Some("taxon.col__alternative_id"), false)
            .taxon_row(&record, &Hierarchy::new())
            .unwrap();
        assert_eq!(row.outlink_id, "Rosa_acicularis");

        let record = TaxonRecord {
            taxon_id: "t1".into(),
            verbatim_name: "Rosa acicularis".into(),
            outlink_value: "wikidata:Q123".into(),
            ..TaxonRecord::default()
        };
        let row = builder(Some("taxon.col__alternative_id"), false)
            .taxon_row(&record, &Hierarchy::new())
            .unwrap();
        assert_eq!(row.outlink_id, "");
    }

    #[test]
    fn prefer_flat_uses_the_flat_columns() {
        let mut record = TaxonRecord {
            taxon_id: "t1".into(),
            verbatim_name: "Rosa acicularis".into(),
            ..TaxonRecord::default()
        };
        record.flat.insert(
            "kingdom".into(),
            FlatEntry {
                name: "Animalia".into(),
                id: "ak".into(),
            },
        );

        let row = builder(None, true).taxon_row(&record, &hierarchy()).unwrap();
        assert_eq!(row.classification, "Animalia");

        let row = builder(None, false).taxon_row(&record, &hierarchy()).unwrap();
        assert_eq!(row.classification, "Plantae|Rosa acicularis");
    }
}
