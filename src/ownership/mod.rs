//! Recursive owner/group normalization.
//!
//! Paths are enumerated first and changed afterwards, so a failure while
//! changing one path never interrupts the enumeration. Per path failures are
//! counted, only a missing root fails the call.

use crate::result_error::error::Error;
use crate::result_error::result::Result;
use crate::result_error::WithMsg;
use bon::Builder;
use getset::Getters;
use nix::errno::Errno;
use nix::unistd::{chown, Gid, Uid};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use validator::Validate;
use walkdir::WalkDir;

pub const DEFAULT_UID: u32 = 1000;
pub const DEFAULT_GID: u32 = 1000;

pub fn default_uid() -> u32 {
    DEFAULT_UID
}

pub fn default_gid() -> u32 {
    DEFAULT_GID
}

fn default_include_dirs() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct OwnershipConfig {
    #[builder(into)]
    root: PathBuf,
    #[serde(default = "default_uid")]
    #[builder(default = default_uid())]
    uid: u32,
    #[serde(default = "default_gid")]
    #[builder(default = default_gid())]
    gid: u32,
    /// Only report what would change.
    #[serde(default)]
    #[builder(default)]
    dry_run: bool,
    /// When false, directories (the root included) keep their ownership but
    /// are still descended into.
    #[serde(default = "default_include_dirs")]
    #[builder(default = default_include_dirs())]
    include_dirs: bool,
}

/// Summary of one normalization run.
///
/// `scanned == changed + skipped + errors` always holds.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnershipJobResult {
    pub root: PathBuf,
    pub uid: u32,
    pub gid: u32,
    pub dry_run: bool,
    pub include_dirs: bool,
    pub scanned: u64,
    pub changed: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathOutcome {
    Changed,
    Skipped,
    Error,
}

impl OwnershipJobResult {
    fn record(&mut self, outcome: PathOutcome) {
        self.scanned += 1;
        match outcome {
            PathOutcome::Changed => self.changed += 1,
            PathOutcome::Skipped => self.skipped += 1,
            PathOutcome::Error => self.errors += 1,
        }
    }
}

impl OwnershipConfig {
    /// Applies `uid:gid` to `root` and everything below it.
    pub fn normalize(&self) -> Result<OwnershipJobResult> {
        if !self.root.exists() {
            return Err(Error::RootNotFound {
                path: self.root.clone(),
            });
        }

        let mut result = OwnershipJobResult {
            root: self.root.clone(),
            uid: self.uid,
            gid: self.gid,
            dry_run: self.dry_run,
            include_dirs: self.include_dirs,
            ..Default::default()
        };

        for entry in self.enumerate() {
            let outcome = match entry {
                Ok(path) => self.apply(&path),
                Err(e) => {
                    let e = Error::from(e).with_msg(format!("Walking {:?} failed", self.root));
                    warn!("{e}");
                    PathOutcome::Error
                }
            };
            result.record(outcome);
        }

        info!(
            "Permission fix complete for {:?} (uid:gid={}:{}) \
             scanned={} changed={} skipped={} errors={}",
            result.root,
            result.uid,
            result.gid,
            result.scanned,
            result.changed,
            result.skipped,
            result.errors
        );
        Ok(result)
    }

    fn enumerate(&self) -> Vec<std::result::Result<PathBuf, walkdir::Error>> {
        let min_depth = if self.include_dirs { 0 } else { 1 };
        WalkDir::new(&self.root)
            .min_depth(min_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|res| res.map(walkdir::DirEntry::into_path))
            .collect()
    }

    fn apply(&self, path: &Path) -> PathOutcome {
        // a path that vanished is not a directory; chown below reports it missing
        let is_dir = std::fs::metadata(path).is_ok_and(|md| md.is_dir());
        if is_dir && !self.include_dirs {
            return PathOutcome::Skipped;
        }

        if self.dry_run {
            info!("[DRY-RUN] chown {}:{} {:?}", self.uid, self.gid, path);
            return PathOutcome::Changed;
        }

        match chown(
            path,
            Some(Uid::from_raw(self.uid)),
            Some(Gid::from_raw(self.gid)),
        ) {
            Ok(()) => PathOutcome::Changed,
            Err(Errno::ENOENT) => PathOutcome::Skipped,
            Err(e @ (Errno::EACCES | Errno::EPERM)) => {
                warn!("PermissionError on {:?}: {}", path, e);
                PathOutcome::Error
            }
            Err(e) => {
                warn!("OSError on {:?}: {}", path, e);
                PathOutcome::Error
            }
        }
    }
}
