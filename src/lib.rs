//! mmm - A Minecraft mod manager
//!
//! mmm keeps a Minecraft instance's mods folder in sync with a declarative
//! mod list (`modlist.json`) and a lock file (`modlist-lock.json`) that
//! records the exact file, SHA-1 and download URL of every installed mod.
//!
//! - Mods are resolved on Modrinth and CurseForge for one game version and loader
//! - Every download is verified against its SHA-1 before it replaces anything
//! - Lock and mod list are written atomically
//! - Unknown jars in the mods folder are identified by content
//! - Symlinks can never redirect a write outside the mods folder
//!
//! # Examples
//!
//! ```no_run
//! use mmm::{install::run_install, Config, Metadata, SyncContext};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let meta = Metadata::new("modlist.json");
//! let ctx = SyncContext::from_config(&Config::load()?)?;
//!
//! let report = run_install(&meta, &ctx).await?;
//! println!("Installed {} mods", report.installed.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`manifest`] - The mod list and where its files live
//! - [`lockfile`] - The lock file
//! - [`install`] - Install reconciliation
//! - [`update`] - Update reconciliation
//! - [`registry`] - Catalog abstraction over Modrinth and CurseForge
//! - [`installer`] - Verified downloads into the mods folder
//! - [`identify`] - Content identification of unknown jars
//! - [`atomic`] - Atomic file replacement
//! - [`modpath`] - Safe file names and symlink-aware write paths
//! - [`config`] - User configuration
//! - [`error`] - Error types and result handling

pub mod atomic;
pub mod config;
pub mod curseforge;
pub mod error;
mod fanout;
pub mod fingerprint;
pub mod http;
pub mod identify;
pub mod ignore;
pub mod install;
pub mod installer;
pub mod lockfile;
pub mod logging;
pub mod manifest;
pub mod modpath;
pub mod modrinth;
pub mod registry;
pub mod update;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use install::{InstallReport, ModFailure, Outcome};
pub use installer::{download_and_verify, ensure_locked_file, EnsureOutcome};
pub use lockfile::{LockEntry, LockFile};
pub use manifest::{Loader, Metadata, ModEntry, ModsConfig, Platform, ReleaseType, CONFIG_FILE_NAME};
pub use registry::{
    Downloader, FetchOptions, ModCatalog, PlatformCatalog, RemoteMod, SyncContext,
};
pub use update::UpdateReport;
