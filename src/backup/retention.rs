use crate::backup::slug::{slugify, Slug};
use crate::backup::tar::TAR_FILE_EXT;
use crate::result_error::error::Error;
use crate::result_error::result::Result;
use crate::result_error::WithMsg;
use bon::Builder;
use chrono::{DateTime, TimeDelta, Utc};
use getset::Getters;
use globset::{GlobBuilder, GlobMatcher};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_KEEP_DAYS: i64 = 10;

pub fn default_keep_days() -> i64 {
    DEFAULT_KEEP_DAYS
}

/// Age based deletion of the archives that belong to one logical source.
///
/// `keep_days < 1` keeps everything forever.
#[derive(Clone, Debug, Serialize, Deserialize, Builder, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RetentionPolicy {
    #[builder(default = default_keep_days())]
    keep_days: i64,
    #[builder(into)]
    name_hint: Arc<str>,
}

/// A deletion that failed during pruning. The run carries on regardless.
#[derive(Debug)]
pub struct PruneItemFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<PruneItemFailure>,
}

impl PruneReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl RetentionPolicy {
    pub fn slug(&self) -> Slug {
        slugify(self.name_hint.as_ref())
    }

    fn matcher(&self) -> Result<GlobMatcher> {
        let pattern = format!("*-{}.{}", self.slug(), TAR_FILE_EXT);
        Ok(GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher())
    }

    fn scan(&self, dest: &Path) -> Result<(Vec<PathBuf>, Vec<std::io::Error>)> {
        let matcher = self.matcher()?;
        let (entries, errors): (Vec<_>, Vec<_>) = std::fs::read_dir(dest)
            .map_err(Error::from)
            .with_msg(format!("Listing {:?} failed", dest))?
            .partition_result();
        let paths = entries
            .into_iter()
            .filter(|de| {
                let name = de.file_name();
                !name.to_string_lossy().starts_with('.') && matcher.is_match(&name)
            })
            .map(|de| de.path())
            .sorted()
            .collect_vec();
        for e in &errors {
            tracing::warn!("Failed to read an entry of {:?}: {}", dest, e);
        }
        Ok((paths, errors))
    }

    /// Archive files in `dest` that belong to this policy's source, sorted by name.
    pub fn matching_archives<P: AsRef<Path>>(&self, dest: P) -> Result<Vec<PathBuf>> {
        self.scan(dest.as_ref()).map(|(paths, _)| paths)
    }

    /// Deletes matching archives whose modification time is strictly older
    /// than `now - keep_days`.
    ///
    /// Files that vanish while pruning are not errors. Failed deletions are
    /// collected in the report instead of failing the call.
    pub fn prune<P: AsRef<Path>>(&self, dest: P, now: DateTime<Utc>) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        if self.keep_days < 1 {
            tracing::info!("keep_days < 1; skipping prune.");
            return Ok(report);
        }

        let dest = dest.as_ref();
        if !dest.exists() {
            tracing::info!("{:?} does not exist - nothing to prune", dest);
            return Ok(report);
        }

        let Some(cutoff) =
            TimeDelta::try_days(self.keep_days).and_then(|d| now.checked_sub_signed(d))
        else {
            tracing::info!(
                "keep_days {} reaches past the earliest date; nothing to prune.",
                self.keep_days
            );
            return Ok(report);
        };

        let (paths, entry_errors) = self.scan(dest)?;
        report
            .failures
            .extend(entry_errors.into_iter().map(|e| PruneItemFailure {
                path: dest.to_path_buf(),
                error: e.into(),
            }));
        for path in paths {
            let modified = match std::fs::metadata(&path).and_then(|md| md.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!("Failed to stat {:?}: {}", path, e);
                    report.failures.push(PruneItemFailure {
                        path,
                        error: e.into(),
                    });
                    continue;
                }
            };

            if modified >= cutoff {
                tracing::debug!("Keeping {:?} (mtime {})", path, modified);
                continue;
            }

            tracing::info!(
                "Pruning old archive: {:?}",
                path.file_name().unwrap_or_default()
            );
            match std::fs::remove_file(&path) {
                Ok(()) => report.deleted.push(path),
                Err(e) if e.kind() == ErrorKind::NotFound => report.deleted.push(path),
                Err(e) => {
                    tracing::warn!("Failed to prune {:?}: {}", path, e);
                    report.failures.push(PruneItemFailure {
                        path,
                        error: e.into(),
                    });
                }
            }
        }

        tracing::info!(
            "Pruned {} archive(s) older than {} day(s).",
            report.deleted_count(),
            self.keep_days
        );
        if report.has_failures() {
            tracing::warn!("{} archive(s) could not be pruned", report.failures.len());
        }
        Ok(report)
    }
}
