use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row};
use semver::Version;

use crate::breadcrumbs::{FlatClassification, FlatEntry, CLASSIFICATION_RANKS};
use crate::errors::{ArchiveError, Error};
use crate::outlink::{OutlinkColumn, Stage, Table};

/// One name row as the name-strings loader sees it.
#[derive(Debug, Clone, Default)]
pub struct NameStringsRow {
    /// `gn__scientific_name_string`, the parsed form with authorship.
    pub parsed: String,
    /// `col__scientific_name`, the verbatim fallback.
    pub verbatim: String,
}

/// The taxon+name join row the hierarchy builder consumes.
#[derive(Debug, Clone, Default)]
pub struct TaxonNameRow {
    pub id: String,
    pub parent_id: String,
    pub status: String,
    pub scientific_name: String,
    pub rank: String,
}

/// An accepted taxon with everything the indices writer needs.
#[derive(Debug, Clone, Default)]
pub struct TaxonRecord {
    pub taxon_id: String,
    pub name_id: String,
    pub status: String,
    pub parsed_name: String,
    pub verbatim_name: String,
    pub rank: String,
    pub code: String,
    pub global_id: String,
    pub local_id: String,
    pub outlink_value: String,
    pub flat: FlatClassification,
}

#[derive(Debug, Clone, Default)]
pub struct SynonymRecord {
    pub synonym_id: String,
    pub taxon_id: String,
    pub status: String,
    pub name_id: String,
    pub parsed_name: String,
    pub verbatim_name: String,
    pub rank: String,
    pub code: String,
    pub global_id: String,
    pub local_id: String,
    pub outlink_value: String,
    pub flat: FlatClassification,
}

/// A name referenced by neither `taxon` nor `synonym`.
#[derive(Debug, Clone, Default)]
pub struct BareNameRecord {
    pub name_id: String,
    pub parsed_name: String,
    pub verbatim_name: String,
    pub rank: String,
    pub code: String,
    pub global_id: String,
    pub local_id: String,
    pub outlink_value: String,
}

#[derive(Debug, Clone, Default)]
pub struct VernacularRow {
    pub taxon_id: String,
    pub name: String,
    pub language: String,
    pub locality: String,
    pub country: String,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveMeta {
    pub title: String,
    pub description: String,
    pub doi: String,
}


/// A read-only handle over one extracted SFGA SQLite file.
///
/// The connection is single-threaded by design; stages that parallelise do
/// so on value-typed rows read on the owning thread.
pub struct Archive {
    conn: Connection,
    path: PathBuf,
    name_columns: HashSet<String>,
    taxon_columns: HashSet<String>,
    synonym_columns: HashSet<String>,
    vernacular_columns: HashSet<String>,
}

impl Archive {
    pub fn open(path: &Path) -> Result<Archive, Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|err| ArchiveError::Read(format!("{}: {err}", path.display())))?;

        // a zip that contained garbage still opens, the ping weeds it out
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|err| ArchiveError::Read(format!("{}: {err}", path.display())))?;

        let name_columns = table_columns(&conn, "name")?;
        let taxon_columns = table_columns(&conn, "taxon")?;
        let synonym_columns = table_columns(&conn, "synonym")?;
        let vernacular_columns = table_columns(&conn, "vernacular")?;

        Ok(Archive {
            conn,
            path: path.to_path_buf(),
            name_columns,
            taxon_columns,
            synonym_columns,
            vernacular_columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(self) -> Result<(), Error> {
        self.conn.close().map_err(|(_, err)| Error::Sqlite(err))
    }

    /// Reads `VERSION.ID` and fails the source when it is absent, not a
    /// semantic version, or older than the configured minimum.
    pub fn check_version(&self, minimum: &Version) -> Result<Version, Error> {
        let raw: String = self
            .conn
            .query_row("SELECT id FROM version LIMIT 1", [], |row| text(row, 0))
            .map_err(ArchiveError::VersionRead)?;

        let trimmed = raw.trim().trim_start_matches('v');
        let found = Version::parse(trimmed).map_err(|_| ArchiveError::VersionUnparseable(raw.clone()))?;

        if found < *minimum {
            return Err(ArchiveError::VersionTooOld {
                found,
                minimum: minimum.clone(),
            }
            .into());
        }

        Ok(found)
    }

    pub fn name_count(&self) -> Result<i64, Error> {
        self.count("name")
    }

    pub fn taxon_count(&self) -> Result<i64, Error> {
        self.count("taxon")
    }

    pub fn synonym_count(&self) -> Result<i64, Error> {
        self.count("synonym")
    }

    pub fn vernacular_count(&self) -> Result<i64, Error> {
        if !self.has_table("vernacular") {
            return Ok(0);
        }
        self.count("vernacular")
    }

    fn count(&self, table: &str) -> Result<i64, Error> {
        let total = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(total)
    }

    fn has_table(&self, table: &str) -> bool {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)
            .unwrap_or(false)
    }

    /// Streams rows until the callback asks to stop by returning false.
    fn stream<T, M, F>(&self, sql: &str, map: M, each: &mut F) -> Result<(), Error>
    where
        M: Fn(&Row) -> rusqlite::Result<T>,
        F: FnMut(T) -> Result<bool, Error>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| map(row))?;

        for row in rows {
            if !each(row?)? {
                break;
            }
        }

        Ok(())
    }

    pub fn each_name_string<F>(&self, each: &mut F) -> Result<(), Error>
    where
        F: FnMut(NameStringsRow) -> Result<bool, Error>,
    {
        let sql = format!(
            "SELECT {}, {} FROM name",
            self.col_or_empty(Table::Name, "name", "gn__scientific_name_string"),
            self.col_or_empty(Table::Name, "name", "col__scientific_name"),
        );

        self.stream(
            &sql,
            |row| {
                Ok(NameStringsRow {
                    parsed: text(row, 0)?,
                    verbatim: text(row, 1)?,
                })
            },
            each,
        )
    }

    pub fn each_taxon_name<F>(&self, each: &mut F) -> Result<(), Error>
    where
        F: FnMut(TaxonNameRow) -> Result<bool, Error>,
    {
        let sql = "SELECT t.col__id, t.col__parent_id, t.col__status_id, n.col__scientific_name, n.col__rank_id \
                   FROM taxon t JOIN name n ON n.col__id = t.col__name_id";

        self.stream(
            sql,
            |row| {
                Ok(TaxonNameRow {
                    id: text(row, 0)?,
                    parent_id: text(row, 1)?,
                    status: text(row, 2)?,
                    scientific_name: text(row, 3)?,
                    rank: text(row, 4)?,
                })
            },
            each,
        )
    }

    pub fn each_taxon_record<F>(&self, outlink: Option<&OutlinkColumn>, each: &mut F) -> Result<(), Error>
    where
        F: FnMut(TaxonRecord) -> Result<bool, Error>,
    {
        let mut select = vec![
            "t.col__id".to_string(),
            "t.col__name_id".to_string(),
            "t.col__status_id".to_string(),
            self.col_or_empty(Table::Name, "n", "gn__scientific_name_string"),
            self.col_or_empty(Table::Name, "n", "col__scientific_name"),
            self.col_or_empty(Table::Name, "n", "col__rank_id"),
            self.col_or_empty(Table::Name, "n", "col__code_id"),
            self.col_or_empty(Table::Name, "n", "col__global_id"),
            self.col_or_empty(Table::Name, "n", "col__local_id"),
            self.outlink_select(outlink, Stage::Taxa),
        ];
        self.push_flat_columns(&mut select);

        let sql = format!(
            "SELECT {} FROM taxon t JOIN name n ON n.col__id = t.col__name_id",
            select.join(", ")
        );

        self.stream(
            &sql,
            |row| {
                Ok(TaxonRecord {
                    taxon_id: text(row, 0)?,
                    name_id: text(row, 1)?,
                    status: text(row, 2)?,
                    parsed_name: text(row, 3)?,
                    verbatim_name: text(row, 4)?,
                    rank: text(row, 5)?,
                    code: text(row, 6)?,
                    global_id: text(row, 7)?,
                    local_id: text(row, 8)?,
                    outlink_value: text(row, 9)?,
                    flat: flat_classification(row, 10)?,
                })
            },
            each,
        )
    }

    pub fn each_synonym_record<F>(&self, outlink: Option<&OutlinkColumn>, each: &mut F) -> Result<(), Error>
    where
        F: FnMut(SynonymRecord) -> Result<bool, Error>,
    {
        let mut select = vec![
            "s.col__id".to_string(),
            "s.col__taxon_id".to_string(),
            self.col_or_empty(Table::Synonym, "s", "col__status_id"),
            "n.col__id".to_string(),
            self.col_or_empty(Table::Name, "n", "gn__scientific_name_string"),
            self.col_or_empty(Table::Name, "n", "col__scientific_name"),
            self.col_or_empty(Table::Name, "n", "col__rank_id"),
            self.col_or_empty(Table::Name, "n", "col__code_id"),
            self.col_or_empty(Table::Name, "n", "col__global_id"),
            self.col_or_empty(Table::Name, "n", "col__local_id"),
            self.outlink_select(outlink, Stage::Synonyms),
        ];
        self.push_flat_columns(&mut select);

        let sql = format!(
            "SELECT {} FROM synonym s \
             JOIN name n ON n.col__id = s.col__name_id \
             JOIN taxon t ON t.col__id = s.col__taxon_id",
            select.join(", ")
        );

        self.stream(
            &sql,
            |row| {
                Ok(SynonymRecord {
                    synonym_id: text(row, 0)?,
                    taxon_id: text(row, 1)?,
                    status: text(row, 2)?,
                    name_id: text(row, 3)?,
                    parsed_name: text(row, 4)?,
                    verbatim_name: text(row, 5)?,
                    rank: text(row, 6)?,
                    code: text(row, 7)?,
                    global_id: text(row, 8)?,
                    local_id: text(row, 9)?,
                    outlink_value: text(row, 10)?,
                    flat: flat_classification(row, 11)?,
                })
            },
            each,
        )
    }

    pub fn each_bare_name<F>(&self, outlink: Option<&OutlinkColumn>, each: &mut F) -> Result<(), Error>
    where
        F: FnMut(BareNameRecord) -> Result<bool, Error>,
    {
        let select = vec![
            "name.col__id".to_string(),
            self.col_or_empty(Table::Name, "name", "gn__scientific_name_string"),
            self.col_or_empty(Table::Name, "name", "col__scientific_name"),
            self.col_or_empty(Table::Name, "name", "col__rank_id"),
            self.col_or_empty(Table::Name, "name", "col__code_id"),
            self.col_or_empty(Table::Name, "name", "col__global_id"),
            self.col_or_empty(Table::Name, "name", "col__local_id"),
            self.outlink_select(outlink, Stage::BareNames),
        ];

        let sql = format!(
            "SELECT {} FROM name \
             WHERE name.col__id NOT IN \
             (SELECT col__name_id FROM taxon UNION SELECT col__name_id FROM synonym)",
            select.join(", ")
        );

        self.stream(
            &sql,
            |row| {
                Ok(BareNameRecord {
                    name_id: text(row, 0)?,
                    parsed_name: text(row, 1)?,
                    verbatim_name: text(row, 2)?,
                    rank: text(row, 3)?,
                    code: text(row, 4)?,
                    global_id: text(row, 5)?,
                    local_id: text(row, 6)?,
                    outlink_value: text(row, 7)?,
                })
            },
            each,
        )
    }

    /// Distinct vernacular names. The whole set is held in memory between
    /// the two vernacular phases; cardinalities stay far below name counts.
    pub fn vernacular_strings(&self) -> Result<Vec<String>, Error> {
        if !self.has_table("vernacular") {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        self.stream(
            "SELECT DISTINCT col__name FROM vernacular",
            |row| text(row, 0),
            &mut |name: String| {
                if !name.is_empty() {
                    names.push(name);
                }
                Ok(true)
            },
        )?;
        Ok(names)
    }

    pub fn each_vernacular<F>(&self, each: &mut F) -> Result<(), Error>
    where
        F: FnMut(VernacularRow) -> Result<bool, Error>,
    {
        if !self.has_table("vernacular") {
            return Ok(());
        }

        let sql = format!(
            "SELECT DISTINCT col__taxon_id, col__name, {}, {}, {} FROM vernacular",
            self.vernacular_col_or_empty("col__language"),
            self.vernacular_col_or_empty("col__area"),
            self.vernacular_col_or_empty("col__country"),
        );

        self.stream(
            &sql,
            |row| {
                Ok(VernacularRow {
                    taxon_id: text(row, 0)?,
                    name: text(row, 1)?,
                    language: text(row, 2)?,
                    locality: text(row, 3)?,
                    country: text(row, 4)?,
                })
            },
            each,
        )
    }

    /// The single metadata row, or None when the archive has none. A
    /// missing row is ordinary, not an error.
    pub fn metadata(&self) -> Result<Option<ArchiveMeta>, Error> {
        if !self.has_table("metadata") {
            return Ok(None);
        }

        let meta = self
            .conn
            .query_row(
                "SELECT col__title, col__description, col__doi FROM metadata LIMIT 1",
                [],
                |row| {
                    Ok(ArchiveMeta {
                        title: text(row, 0)?,
                        description: text(row, 1)?,
                        doi: text(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    fn columns(&self, table: Table) -> &HashSet<String> {
        match table {
            Table::Name => &self.name_columns,
            Table::Taxon => &self.taxon_columns,
            Table::Synonym => &self.synonym_columns,
        }
    }

    /// Optional columns degrade to an empty literal instead of failing the
    /// query.
    fn col_or_empty(&self, table: Table, alias: &str, column: &str) -> String {
        if self.columns(table).contains(column) {
            format!("{alias}.{column}")
        }
        else {
            "''".to_string()
        }
    }

    fn vernacular_col_or_empty(&self, column: &str) -> String {
        if self.vernacular_columns.contains(column) {
            format!("vernacular.{column}")
        }
        else {
            "''".to_string()
        }
    }

    fn outlink_select(&self, outlink: Option<&OutlinkColumn>, stage: Stage) -> String {
        match outlink {
            Some(column) => match column.select_expr(stage) {
                Some(expr) if self.columns(column.table).contains(&column.column) => expr,
                _ => "''".to_string(),
            },
            None => "''".to_string(),
        }
    }

    fn push_flat_columns(&self, select: &mut Vec<String>) {
        for rank in CLASSIFICATION_RANKS {
            select.push(self.col_or_empty(Table::Taxon, "t", &format!("col__{rank}")));
            select.push(self.col_or_empty(Table::Taxon, "t", &format!("sf__{rank}_id")));
        }
    }
}

/// Stringifies whatever the column holds; invalid UTF-8 is repaired with
/// replacement characters rather than failing the row.
fn text(row: &Row, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    })
}

fn flat_classification(row: &Row, start: usize) -> rusqlite::Result<FlatClassification> {
    let mut flat = FlatClassification::new();

    for (i, rank) in CLASSIFICATION_RANKS.iter().enumerate() {
        let name = text(row, start + i * 2)?;
        if name.is_empty() {
            continue;
        }
        let id = text(row, start + i * 2 + 1)?;
        flat.insert(rank.to_string(), FlatEntry { name, id });
    }

    Ok(flat)
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = HashSet::new();
    for row in rows {
        columns.insert(row?);
    }
    Ok(columns)
}


#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn seed_archive(conn: &Connection) {
        conn.execute_batch(
            r#"
            CREATE TABLE version (id TEXT);
            INSERT INTO version VALUES ('v0.3.9');

            CREATE TABLE name (
                col__id TEXT,
                gn__scientific_name_string TEXT,
                col__scientific_name TEXT,
                col__rank_id TEXT,
                col__code_id TEXT,
                col__alternative_id TEXT
            );
            CREATE TABLE taxon (
                col__id TEXT,
                col__name_id TEXT,
                col__parent_id TEXT,
                col__status_id TEXT,
                col__alternative_id TEXT,
                col__kingdom TEXT, sf__kingdom_id TEXT,
                col__family TEXT, sf__family_id TEXT,
                col__genus TEXT, sf__genus_id TEXT
            );
            CREATE TABLE synonym (
                col__id TEXT,
                col__taxon_id TEXT,
                col__name_id TEXT,
                col__status_id TEXT
            );
            CREATE TABLE vernacular (
                col__taxon_id TEXT,
                col__name TEXT,
                col__language TEXT,
                col__area TEXT,
                col__country TEXT
            );
            CREATE TABLE metadata (col__title TEXT, col__description TEXT, col__doi TEXT);

            INSERT INTO name VALUES
                ('n1', 'Rosa acicularis Lindl.', 'Rosa acicularis', 'species', 'botanical', 'gnoutlink:ra'),
                ('n2', 'Rosa canina', 'Rosa canina', 'species', 'botanical', ''),
                ('n3', '', 'Homo sapiens', 'species', 'zoological', '');
            INSERT INTO taxon VALUES
                ('1', 'n1', '', 'accepted', 'wikidata:Q123,gnoutlink:Rosa_acicularis',
                 'Plantae', 'k1', 'Rosaceae', 'f1', 'Rosa', 'g1');
            INSERT INTO synonym VALUES ('syn1', '1', 'n2', '');
            INSERT INTO vernacular VALUES ('1', 'prickly rose', 'English', 'Canada', 'CA');
            INSERT INTO metadata VALUES ('Rose List', 'roses of the north', '10.1000/rose');
            "#,
        )
        .unwrap();
    }

    fn open_seeded() -> (tempfile::TempDir, Archive) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001_test_2025-01-01.sqlite");
        let conn = Connection::open(&path).unwrap();
        seed_archive(&conn);
        conn.close().unwrap();
        (dir, Archive::open(&path).unwrap())
    }

    #[test]
    fn version_gate_accepts_recent_archives() {
        let (_dir, archive) = open_seeded();
        let minimum = Version::parse("0.2.0").unwrap();
        let found = archive.check_version(&minimum).unwrap();
        assert_eq!(found, Version::parse("0.3.9").unwrap());
    }

    #[test]
    fn version_gate_rejects_old_archives() {
        let (_dir, archive) = open_seeded();
        let minimum = Version::parse("0.4.0").unwrap();
        let err = archive.check_version(&minimum).unwrap_err();
        assert!(matches!(err, Error::Archive(ArchiveError::VersionTooOld { .. })));
    }

    #[test]
    fn version_gate_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001_x.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE version (id TEXT); INSERT INTO version VALUES ('latest');")
            .unwrap();
        conn.close().unwrap();

        let archive = Archive::open(&path).unwrap();
        let minimum = Version::parse("0.2.0").unwrap();
        let err = archive.check_version(&minimum).unwrap_err();
        assert!(matches!(err, Error::Archive(ArchiveError::VersionUnparseable(_))));
    }

    #[test]
    fn streams_name_strings() {
        let (_dir, archive) = open_seeded();

        let mut rows = Vec::new();
        archive
            .each_name_string(&mut |row| {
                rows.push(row);
                Ok(true)
            })
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].parsed, "Rosa acicularis Lindl.");
        assert_eq!(rows[2].parsed, "");
        assert_eq!(rows[2].verbatim, "Homo sapiens");
    }

    #[test]
    fn streaming_stops_when_asked() {
        let (_dir, archive) = open_seeded();

        let mut seen = 0;
        archive
            .each_name_string(&mut |_| {
                seen += 1;
                Ok(false)
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn taxon_records_carry_flat_classification_and_outlink() {
        let (_dir, archive) = open_seeded();
        let outlink = OutlinkColumn::parse("taxon.col__alternative_id").unwrap();

        let mut records = Vec::new();
        archive
            .each_taxon_record(Some(&outlink), &mut |record| {
                records.push(record);
                Ok(true)
            })
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.taxon_id, "1");
        assert_eq!(record.parsed_name, "Rosa acicularis Lindl.");
        assert_eq!(record.flat.get("kingdom").unwrap().name, "Plantae");
        assert_eq!(record.flat.get("kingdom").unwrap().id, "k1");
        assert_eq!(record.flat.get("genus").unwrap().name, "Rosa");
        assert!(!record.flat.contains_key("phylum"));
        assert_eq!(record.outlink_value, "wikidata:Q123,gnoutlink:Rosa_acicularis");
    }

    #[test]
    fn illegal_outlink_column_degrades_to_empty() {
        let (_dir, archive) = open_seeded();
        // synonym table is not joinable in the taxa sub-stage
        let outlink = OutlinkColumn::parse("synonym.col__id").unwrap();

        let mut records = Vec::new();
        archive
            .each_taxon_record(Some(&outlink), &mut |record| {
                records.push(record);
                Ok(true)
            })
            .unwrap();
        assert_eq!(records[0].outlink_value, "");
    }

    #[test]
    fn synonyms_join_their_accepted_taxon() {
        let (_dir, archive) = open_seeded();

        let mut records = Vec::new();
        archive
            .each_synonym_record(None, &mut |record| {
                records.push(record);
                Ok(true)
            })
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].synonym_id, "syn1");
        assert_eq!(records[0].taxon_id, "1");
        assert_eq!(records[0].status, "");
        assert_eq!(records[0].flat.get("family").unwrap().name, "Rosaceae");
    }

    #[test]
    fn bare_names_are_the_unreferenced_ones() {
        let (_dir, archive) = open_seeded();

        let mut records = Vec::new();
        archive
            .each_bare_name(None, &mut |record| {
                records.push(record);
                Ok(true)
            })
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name_id, "n3");
        assert_eq!(records[0].verbatim_name, "Homo sapiens");
    }

    #[test]
    fn vernaculars_stream_with_metadata() {
        let (_dir, archive) = open_seeded();

        assert_eq!(archive.vernacular_strings().unwrap(), vec!["prickly rose".to_string()]);

        let mut rows = Vec::new();
        archive
            .each_vernacular(&mut |row| {
                rows.push(row);
                Ok(true)
            })
            .unwrap();
        assert_eq!(rows[0].language, "English");
        assert_eq!(rows[0].country, "CA");

        let meta = archive.metadata().unwrap().unwrap();
        assert_eq!(meta.title, "Rose List");
        assert_eq!(meta.doi, "10.1000/rose");
    }

    #[test]
    fn missing_metadata_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0002_bare.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE version (id TEXT); INSERT INTO version VALUES ('0.3.0');
             CREATE TABLE name (col__id TEXT, col__scientific_name TEXT);
             CREATE TABLE taxon (col__id TEXT, col__name_id TEXT, col__parent_id TEXT, col__status_id TEXT);
             CREATE TABLE synonym (col__id TEXT, col__taxon_id TEXT, col__name_id TEXT);",
        )
        .unwrap();
        conn.close().unwrap();

        let archive = Archive::open(&path).unwrap();
        assert!(archive.metadata().unwrap().is_none());
        assert_eq!(archive.vernacular_count().unwrap(), 0);
        assert!(archive.vernacular_strings().unwrap().is_empty());
    }

    #[test]
    fn integer_ids_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0003_int.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE name (col__id INTEGER, col__scientific_name TEXT);
             INSERT INTO name VALUES (42, 'Aus bus');",
        )
        .unwrap();
        conn.close().unwrap();

        let archive = Archive::open(&path).unwrap();
        let mut rows = Vec::new();
        archive
            .each_name_string(&mut |row| {
                rows.push(row);
                Ok(true)
            })
            .unwrap();
        assert_eq!(rows[0].verbatim, "Aus bus");
    }
}
