use crate::manifest::Platform;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration file not found: {}\n\n\
             Hint: run this command from the folder that holds your mod list,\n\
             or point at it with --config <path>.", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration file {} is not valid: {source}", path.display())]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Lock file {} is not valid: {source}", path.display())]
    LockInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Mod {project_id} was not found on {platform}")]
    ModNotFound {
        platform: Platform,
        project_id: String,
    },

    #[error("No compatible file for {project_id} on {platform}")]
    NoCompatibleFile {
        platform: Platform,
        project_id: String,
    },

    #[error("No {platform} version matches hash {hash}")]
    VersionNotFound { platform: Platform, hash: String },

    #[error("Missing hash for {file_name}")]
    MissingHash { file_name: String },

    #[error("Hash mismatch for {file_name}\nExpected: {expected}\nComputed: {actual}")]
    HashMismatch {
        file_name: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid mod file name {}: {reason}", display_file_name(value))]
    InvalidFileName {
        value: String,
        reason: FileNameReason,
    },

    #[error("Refusing to write {}: it resolves to {}, outside of {}",
            path.display(), resolved.display(), root.display())]
    OutsideRoot {
        path: PathBuf,
        resolved: PathBuf,
        root: PathBuf,
    },

    #[error("{project_id} ({platform}) has no lock entry\n\nHint: run `mmm install` first.")]
    MissingLockEntry {
        platform: Platform,
        project_id: String,
    },

    #[error("Locked file {} is missing\n\nHint: run `mmm install` to restore it.", path.display())]
    LockedFileMissing { path: PathBuf },

    #[error("Invalid release timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Cannot allocate a free sibling path for {}", path.display())]
    SiblingPathExhausted { path: PathBuf },

    #[error("Loader {loader} is not supported by {platform}")]
    UnsupportedLoader { platform: Platform, loader: String },

    #[error("{platform} does not support {lookup} lookups")]
    UnsupportedLookup {
        platform: Platform,
        lookup: &'static str,
    },

    #[error("Unexpected HTTP {status} from {url}")]
    Api { status: u16, url: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No download URL for {file_name}")]
    MissingDownloadUrl { file_name: String },

    #[error("Unresolved files in the mods folder:\n{}\n\n\
             Hint: add them to the mod list or to .mmmignore, or remove them.",
            list_files(files))]
    UnresolvedFiles { files: Vec<String> },

    #[error("Unmanaged files in the mods folder:\n{}\n\n\
             Hint: add them to the mod list or to .mmmignore before updating.",
            list_files(files))]
    UnmanagedFiles { files: Vec<String> },

    #[error("Install finished with {failed} failed mod(s); not updating")]
    InstallIncomplete { failed: usize },

    #[error("{}", join_messages(.0))]
    Joined(Vec<Error>),

    #[error("{0}")]
    Other(String),
}

/// Why a mod file name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameReason {
    Empty,
    UncPath,
    DriveLetter,
    PathSeparator,
    Extension,
}

impl std::fmt::Display for FileNameReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            FileNameReason::Empty => "empty",
            FileNameReason::UncPath => "unc_path",
            FileNameReason::DriveLetter => "drive_letter",
            FileNameReason::PathSeparator => "path_separator",
            FileNameReason::Extension => "extension",
        };
        f.write_str(reason)
    }
}

fn display_file_name(value: &str) -> String {
    if value.trim().is_empty() {
        "(empty)".to_string()
    } else {
        format!("{:?}", value)
    }
}

fn list_files(files: &[String]) -> String {
    files
        .iter()
        .map(|f| format!("  {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Attach a path to an I/O error
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::IoAt {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Combine a primary error with errors raised while rolling it back.
    ///
    /// Returns the primary error untouched when there is nothing to add.
    pub fn join(primary: Error, rollback: Vec<Error>) -> Self {
        if rollback.is_empty() {
            return primary;
        }
        let mut errors = Vec::with_capacity(rollback.len() + 1);
        match primary {
            Error::Joined(inner) => errors.extend(inner),
            other => errors.push(other),
        }
        errors.extend(rollback);
        Error::Joined(errors)
    }

    /// Remote errors that are reported per mod without aborting the batch
    pub fn is_expected(&self) -> bool {
        matches!(self, Error::ModNotFound { .. } | Error::NoCompatibleFile { .. })
    }

    /// Integrity errors: fatal for one mod, never for the batch
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Error::MissingHash { .. }
                | Error::HashMismatch { .. }
                | Error::InvalidFileName { .. }
                | Error::OutsideRoot { .. }
        )
    }

    /// Errors that fail one mod and let the rest of the batch continue
    pub fn is_per_item(&self) -> bool {
        self.is_expected()
            || self.is_integrity()
            || matches!(
                self,
                Error::MissingLockEntry { .. }
                    | Error::LockedFileMissing { .. }
                    | Error::InvalidTimestamp { .. }
                    | Error::MissingDownloadUrl { .. }
            )
    }

    /// Errors that abort a run before anything on disk was touched
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigInvalid { .. }
                | Error::LockInvalid { .. }
                | Error::UnresolvedFiles { .. }
                | Error::UnmanagedFiles { .. }
                | Error::InstallIncomplete { .. }
        )
    }
}
