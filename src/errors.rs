use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the warehouse is not reachable: {0}")]
    NotConnected(String),

    #[error("an error occurred with the warehouse connection")]
    Database(#[from] diesel::result::Error),

    #[error("an error occurred getting a warehouse connection")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("an error occurred reading the archive")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no sources match the filter '{0}'")]
    NoSources(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("cache directory operation failed at {path}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("all {0} selected sources failed")]
    AllSourcesFailed(usize),

    #[error("the run was cancelled")]
    Cancelled,

    #[error("the run was aborted by the operator")]
    Aborted,
}

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("no archive file matches source id {id} under {parent}")]
    NotFound { id: i32, parent: String },

    #[error("cannot read the archive: {0}")]
    Read(String),

    #[error("the operator declined the selected archive {0}")]
    Declined(String),

    #[error("cannot read the archive schema version")]
    VersionRead(#[source] rusqlite::Error),

    #[error("the archive schema version '{0}' is not a semantic version")]
    VersionUnparseable(String),

    #[error("the archive schema version {found} is older than the required minimum {minimum}")]
    VersionTooOld {
        found: semver::Version,
        minimum: semver::Version,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read the sources catalog at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse the sources catalog")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid entry for source {id}: {reason}")]
    InvalidSource { id: i32, reason: String },

    #[error("invalid source filter '{0}'")]
    Filter(String),

    #[error("populate.min_archive_version '{0}' is not a semantic version")]
    MinVersion(String),
}
