//! Mod list parsing and management
//!
//! The mod list (`modlist.json` by default) declares which mods a Minecraft
//! instance should have, the loader and game version they target, and where
//! the mods folder lives relative to the file itself.
//!
//! # Examples
//!
//! ```no_run
//! use mmm::{Metadata, ModsConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let meta = Metadata::new("modlist.json");
//! let config = ModsConfig::load(&meta)?;
//!
//! println!("{} mods for {} {}", config.mods.len(), config.loader, config.game_version);
//! println!("Mods folder: {}", meta.mods_folder_path(&config).display());
//! # Ok(())
//! # }
//! ```

use crate::atomic::write_atomic;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default mod list filename
pub const CONFIG_FILE_NAME: &str = "modlist.json";

/// Remote catalog a mod is published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Curseforge,
    Modrinth,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Curseforge => "curseforge",
            Platform::Modrinth => "modrinth",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Alpha,
    Beta,
    Release,
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseType::Alpha => "alpha",
            ReleaseType::Beta => "beta",
            ReleaseType::Release => "release",
        };
        f.write_str(name)
    }
}

/// Mod loader or server platform the instance runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    Bukkit,
    Bungeecord,
    Cauldron,
    Datapack,
    Fabric,
    Folia,
    Forge,
    Liteloader,
    Modloader,
    Neoforge,
    Paper,
    Purpur,
    Quilt,
    Rift,
    Spigot,
    Sponge,
    Velocity,
    Waterfall,
}

impl Loader {
    pub fn as_str(&self) -> &'static str {
        match self {
            Loader::Bukkit => "bukkit",
            Loader::Bungeecord => "bungeecord",
            Loader::Cauldron => "cauldron",
            Loader::Datapack => "datapack",
            Loader::Fabric => "fabric",
            Loader::Folia => "folia",
            Loader::Forge => "forge",
            Loader::Liteloader => "liteloader",
            Loader::Modloader => "modloader",
            Loader::Neoforge => "neoforge",
            Loader::Paper => "paper",
            Loader::Purpur => "purpur",
            Loader::Quilt => "quilt",
            Loader::Rift => "rift",
            Loader::Spigot => "spigot",
            Loader::Sponge => "sponge",
            Loader::Velocity => "velocity",
            Loader::Waterfall => "waterfall",
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    #[serde(rename = "type")]
    pub platform: Platform,

    pub id: String,

    /// Overrides the list-wide default when present and non-empty
    #[serde(
        rename = "allowedReleaseTypes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_release_types: Option<Vec<ReleaseType>>,

    pub name: String,

    #[serde(
        rename = "allowVersionFallback",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_version_fallback: Option<bool>,

    /// Pinned version; a pinned mod is never updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModEntry {
    pub fn is_same_mod(&self, platform: Platform, project_id: &str) -> bool {
        self.platform == platform && self.id == project_id
    }

    pub fn pinned_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_version().is_some()
    }

    pub fn allows_fallback(&self) -> bool {
        self.allow_version_fallback.unwrap_or(false)
    }

    pub fn effective_release_types(&self, defaults: &[ReleaseType]) -> Vec<ReleaseType> {
        match &self.allowed_release_types {
            Some(types) if !types.is_empty() => types.clone(),
            _ => defaults.to_vec(),
        }
    }
}

/// The mod list file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModsConfig {
    pub loader: Loader,
    pub game_version: String,
    pub default_allowed_release_types: Vec<ReleaseType>,
    pub mods_folder: String,
    #[serde(default)]
    pub mods: Vec<ModEntry>,
}

impl ModsConfig {
    /// Load the mod list the metadata points at
    pub fn load(meta: &Metadata) -> Result<Self> {
        Self::load_from(meta.config_path())
    }

    /// Load a mod list from a specific path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        serde_json::from_slice(&contents).map_err(|source| Error::ConfigInvalid {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, meta: &Metadata) -> Result<()> {
        self.save_to(meta.config_path())
    }

    /// Write the mod list atomically as 2-space indented JSON
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(self)?;
        contents.push(b'\n');
        write_atomic(path.as_ref(), &contents)
    }

    pub fn find_mod(&self, platform: Platform, project_id: &str) -> Option<usize> {
        self.mods
            .iter()
            .position(|m| m.is_same_mod(platform, project_id))
    }
}

/// Paths derived from the mod list location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    config_path: PathBuf,
}

impl Metadata {
    pub fn new<P: Into<PathBuf>>(config_path: P) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory holding the mod list
    pub fn dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// `<dir>/<basename>-lock.json`
    pub fn lock_path(&self) -> PathBuf {
        let stem = self
            .config_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir().join(format!("{}-lock.json", stem))
    }

    /// Absolute mods folder path
    ///
    /// A rooted `modsFolder` (absolute, or starting with `/` or `\`) is used
    /// as-is, anything else is relative to the mod list's directory.
    pub fn mods_folder_path(&self, config: &ModsConfig) -> PathBuf {
        let folder = config.mods_folder.as_str();
        if Path::new(folder).is_absolute() || folder.starts_with('/') || folder.starts_with('\\') {
            PathBuf::from(folder)
        } else {
            self.dir().join(folder)
        }
    }
}
