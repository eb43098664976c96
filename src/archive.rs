use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::errors::{ArchiveError, Error};
use crate::utils::{new_progress_bar_bytes, Prompter};

/// Archive file flavour, ordered by selection preference: the binary form
/// beats the SQL dump and compressed beats uncompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArchiveKind {
    Sql,
    Sqlite,
    SqlZip,
    SqliteZip,
}

impl ArchiveKind {
    fn from_name(name: &str) -> Option<ArchiveKind> {
        if name.ends_with(".sqlite.zip") {
            Some(ArchiveKind::SqliteZip)
        }
        else if name.ends_with(".sql.zip") {
            Some(ArchiveKind::SqlZip)
        }
        else if name.ends_with(".sqlite") {
            Some(ArchiveKind::Sqlite)
        }
        else if name.ends_with(".sql") {
            Some(ArchiveKind::Sql)
        }
        else {
            None
        }
    }

    fn is_zip(&self) -> bool {
        matches!(self, ArchiveKind::SqlZip | ArchiveKind::SqliteZip)
    }
}

static ARCHIVE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}.*\.(sql|sqlite)(\.zip)?$").expect("invalid archive pattern"));
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("invalid date pattern"));
static LISTING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}[A-Za-z0-9._-]*\.(?:sql|sqlite)(?:\.zip)?").expect("invalid listing pattern"));

/// One archive file that matches a source id, with the fields selection
/// ranks on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub file_name: String,
    pub kind: ArchiveKind,
    pub date: Option<NaiveDate>,
}

impl Candidate {
    pub fn from_name(file_name: &str, source_id: i32) -> Option<Candidate> {
        if !file_name.starts_with(&format!("{source_id:04}")) || !ARCHIVE_PATTERN.is_match(file_name) {
            return None;
        }

        let kind = ArchiveKind::from_name(file_name)?;
        let date = DATE_PATTERN
            .find_iter(file_name)
            .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
            .max();

        Some(Candidate {
            file_name: file_name.to_string(),
            kind,
            date,
        })
    }

    fn rank(&self) -> (Option<NaiveDate>, ArchiveKind, &str) {
        (self.date, self.kind, &self.file_name)
    }
}

/// Picks the best candidate: latest embedded date first, then the file-type
/// preference, with the name itself as the final deterministic tiebreak.
pub fn select_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().max_by(|a, b| a.rank().cmp(&b.rank()))
}


/// The staged archive: an extracted SQLite file inside the per-run cache.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub sqlite_path: PathBuf,
    pub file_name: String,
    pub revision_date: Option<NaiveDate>,
}

impl FetchedArchive {
    /// The version string recorded in the data-source row, taken from the
    /// date embedded in the archive file name.
    pub fn version(&self) -> String {
        self.revision_date.map(|date| date.format("%Y-%m-%d").to_string()).unwrap_or_default()
    }
}


/// Resolves, downloads, and extracts one source's archive into the cache.
pub struct ArchiveFetcher<'a> {
    cache_dir: PathBuf,
    prompter: &'a dyn Prompter,
}

impl<'a> ArchiveFetcher<'a> {
    pub fn new(cache_root: &Path, prompter: &'a dyn Prompter) -> ArchiveFetcher<'a> {
        ArchiveFetcher {
            cache_dir: cache_root.join("sfga"),
            prompter,
        }
    }

    pub fn fetch(&self, source: &SourceConfig) -> Result<FetchedArchive, Error> {
        let names = if source.parent_is_http() {
            self.list_http(&source.parent)?
        }
        else {
            self.list_dir(Path::new(&source.parent))?
        };

        let candidates: Vec<Candidate> = names
            .iter()
            .filter_map(|name| Candidate::from_name(name, source.id))
            .collect();

        let Some(chosen) = select_candidate(&candidates) else {
            return Err(ArchiveError::NotFound {
                id: source.id,
                parent: source.parent.clone(),
            }
            .into());
        };

        if candidates.len() > 1 {
            let alternatives: Vec<String> = candidates
                .iter()
                .filter(|candidate| candidate.file_name != chosen.file_name)
                .map(|candidate| candidate.file_name.clone())
                .collect();
            warn!(
                source_id = source.id,
                chosen = chosen.file_name,
                ?alternatives,
                "several archive files match the source"
            );

            if !self.prompter.confirm_archive(&chosen.file_name, &alternatives) {
                return Err(ArchiveError::Declined(chosen.file_name.clone()).into());
            }
        }

        // colliding database handles from a previous source would corrupt
        // reads, so the cache starts empty for every source
        self.clear_cache()?;

        let staged = self.cache_dir.join(&chosen.file_name);
        if source.parent_is_http() {
            self.download(&source.parent, &chosen.file_name, &staged)?;
        }
        else {
            fs::copy(Path::new(&source.parent).join(&chosen.file_name), &staged)
                .map_err(|err| ArchiveError::Read(format!("{}: {err}", chosen.file_name)))?;
        }

        let sqlite_path = if chosen.kind.is_zip() {
            self.extract_zip(&staged)?
        }
        else {
            staged
        };

        if sqlite_path.extension().is_some_and(|ext| ext == "sql") {
            return Err(ArchiveError::Read(format!(
                "{} is an SQL dump; download the sqlite form of the archive instead",
                chosen.file_name
            ))
            .into());
        }

        info!(source_id = source.id, file = chosen.file_name, "archive staged");

        Ok(FetchedArchive {
            sqlite_path,
            file_name: chosen.file_name.clone(),
            revision_date: chosen.date,
        })
    }

    fn list_dir(&self, parent: &Path) -> Result<Vec<String>, Error> {
        let entries = fs::read_dir(parent).map_err(|err| ArchiveError::Read(format!("{}: {err}", parent.display())))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Fetches the parent URL once and scrapes archive-looking file names
    /// out of the listing body.
    fn list_http(&self, parent: &str) -> Result<Vec<String>, Error> {
        let mut response = ureq::get(parent)
            .call()
            .map_err(|err| ArchiveError::Read(format!("{parent}: {err}")))?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| ArchiveError::Read(format!("{parent}: {err}")))?;

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for m in LISTING_PATTERN.find_iter(&body) {
            if seen.insert(m.as_str().to_string()) {
                names.push(m.as_str().to_string());
            }
        }
        Ok(names)
    }

    fn download(&self, parent: &str, file_name: &str, target: &Path) -> Result<(), Error> {
        let url = format!("{}/{file_name}", parent.trim_end_matches('/'));
        let mut response = ureq::get(&url)
            .call()
            .map_err(|err| ArchiveError::Read(format!("{url}: {err}")))?;

        let total = response
            .headers()
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);

        let bar = new_progress_bar_bytes(total, file_name);
        let reader = response.body_mut().as_reader();
        let mut file = fs::File::create(target)?;
        io::copy(&mut bar.wrap_read(reader), &mut file)
            .map_err(|err| ArchiveError::Read(format!("{url}: {err}")))?;
        bar.finish();

        Ok(())
    }

    fn extract_zip(&self, zip_path: &Path) -> Result<PathBuf, Error> {
        let file = fs::File::open(zip_path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|err| ArchiveError::Read(format!("{}: {err}", zip_path.display())))?;

        let member = zip
            .file_names()
            .find(|name| name.ends_with(".sqlite") || name.ends_with(".sql"))
            .map(|name| name.to_string())
            .ok_or_else(|| ArchiveError::Read(format!("{} holds no database file", zip_path.display())))?;

        // members can sit under a directory inside the zip; only the file
        // name lands in the cache
        let base = Path::new(&member).file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(&member));
        let target = self.cache_dir.join(base);
        let mut entry = zip
            .by_name(&member)
            .map_err(|err| ArchiveError::Read(format!("{member}: {err}")))?;
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out).map_err(|err| ArchiveError::Read(format!("{member}: {err}")))?;

        Ok(target)
    }

    fn clear_cache(&self) -> Result<(), Error> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).map_err(|source| Error::Cache {
                path: self.cache_dir.clone(),
                source,
            })?;
        }
        fs::create_dir_all(&self.cache_dir).map_err(|source| Error::Cache {
            path: self.cache_dir.clone(),
            source,
        })?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::AssumeDefaults;

    fn candidate(name: &str) -> Candidate {
        Candidate::from_name(name, 2).unwrap()
    }

    #[test]
    fn matches_only_prefixed_archive_names() {
        assert!(Candidate::from_name("0002_col_2025-01-01.sqlite.zip", 2).is_some());
        assert!(Candidate::from_name("0002.sqlite", 2).is_some());
        assert!(Candidate::from_name("0003_col.sqlite", 2).is_none());
        assert!(Candidate::from_name("0002_col.tar.gz", 2).is_none());
        assert!(Candidate::from_name("readme.txt", 2).is_none());
        assert!(Candidate::from_name("2_col.sqlite", 2).is_none());
    }

    #[test]
    fn extracts_the_embedded_date() {
        assert_eq!(
            candidate("0002_x_2025-02-01.sqlite.zip").date,
            NaiveDate::from_ymd_opt(2025, 2, 1)
        );
        assert_eq!(candidate("0002_x.sqlite").date, None);
    }

    #[test]
    fn selection_prefers_latest_date_then_kind() {
        let candidates = vec![
            candidate("0002_x_2025-01-01.sqlite.zip"),
            candidate("0002_x_2025-02-01.sqlite.zip"),
            candidate("0002_x_2025-02-01.sql"),
        ];

        let chosen = select_candidate(&candidates).unwrap();
        assert_eq!(chosen.file_name, "0002_x_2025-02-01.sqlite.zip");
    }

    #[test]
    fn binary_beats_dump_and_compressed_beats_plain() {
        let candidates = vec![
            candidate("0002_x.sql"),
            candidate("0002_x.sqlite"),
            candidate("0002_x.sql.zip"),
        ];
        assert_eq!(select_candidate(&candidates).unwrap().file_name, "0002_x.sql.zip");

        let candidates = vec![candidate("0002_x.sqlite.zip"), candidate("0002_x.sql.zip")];
        assert_eq!(select_candidate(&candidates).unwrap().file_name, "0002_x.sqlite.zip");
    }

    #[test]
    fn dated_files_beat_undated_ones() {
        let candidates = vec![candidate("0002_x.sqlite.zip"), candidate("0002_x_2020-05-05.sql")];
        assert_eq!(select_candidate(&candidates).unwrap().file_name, "0002_x_2020-05-05.sql");
    }

    fn source(id: i32, parent: &str) -> SourceConfig {
        let yaml = format!("id: {id}\nparent: {parent}");
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn fetches_a_local_sqlite_into_the_cache() {
        let parent = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(parent.path().join("0005_list_2024-06-01.sqlite"), b"stub").unwrap();

        let fetcher = ArchiveFetcher::new(cache.path(), &AssumeDefaults);
        let fetched = fetcher.fetch(&source(5, parent.path().to_str().unwrap())).unwrap();

        assert!(fetched.sqlite_path.exists());
        assert!(fetched.sqlite_path.starts_with(cache.path().join("sfga")));
        assert_eq!(fetched.version(), "2024-06-01");
    }

    #[test]
    fn extracts_zipped_archives() {
        use std::io::Write;

        let parent = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();

        let zip_path = parent.path().join("0007_zipped.sqlite.zip");
        let file = fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("0007_zipped.sqlite", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"database bytes").unwrap();
        writer.finish().unwrap();

        let fetcher = ArchiveFetcher::new(cache.path(), &AssumeDefaults);
        let fetched = fetcher.fetch(&source(7, parent.path().to_str().unwrap())).unwrap();

        assert_eq!(fs::read(&fetched.sqlite_path).unwrap(), b"database bytes");
    }

    #[test]
    fn missing_archive_is_a_resolve_error() {
        let parent = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();

        let fetcher = ArchiveFetcher::new(cache.path(), &AssumeDefaults);
        let err = fetcher.fetch(&source(9, parent.path().to_str().unwrap())).unwrap_err();
        assert!(matches!(err, Error::Archive(ArchiveError::NotFound { id: 9, .. })));
    }

    #[test]
    fn sql_dumps_are_rejected_at_staging() {
        let parent = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(parent.path().join("0011_dump.sql"), b"CREATE TABLE name;").unwrap();

        let fetcher = ArchiveFetcher::new(cache.path(), &AssumeDefaults);
        let err = fetcher.fetch(&source(11, parent.path().to_str().unwrap())).unwrap_err();
        assert!(matches!(err, Error::Archive(ArchiveError::Read(_))));
    }

    #[test]
    fn cache_is_cleared_between_fetches() {
        let parent = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(parent.path().join("0005_a.sqlite"), b"five").unwrap();
        fs::write(parent.path().join("0006_b.sqlite"), b"six").unwrap();

        let fetcher = ArchiveFetcher::new(cache.path(), &AssumeDefaults);
        let first = fetcher.fetch(&source(5, parent.path().to_str().unwrap())).unwrap();
        assert!(first.sqlite_path.exists());

        let second = fetcher.fetch(&source(6, parent.path().to_str().unwrap())).unwrap();
        assert!(second.sqlite_path.exists());
        assert!(!first.sqlite_path.exists());
    }
}
