use crate::backup::exclusion::ExclusionSet;
use crate::backup::retention::{default_keep_days, PruneReport, RetentionPolicy};
use crate::backup::slug::slugify;
use crate::backup::tar::{default_tar_bin, Archive, ArchiveBuilder};
use crate::backup::validate::{validate_dir_exist, validate_not_blank, validate_paths};
use crate::result_error::result::Result;
use crate::result_error::WithDebugObjectAndFnName;
use bon::Builder;
use chrono::{DateTime, Utc};
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// One directory backup: archive `target_dir` into `dest_dir`, then prune
/// older archives of the same source from `dest_dir`.
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupJobConfig {
    #[validate(custom(function = validate_dir_exist))]
    #[builder(into)]
    target_dir: PathBuf,
    #[builder(into)]
    dest_dir: PathBuf,
    /// Comma separated directories relative to `target_dir`.
    #[serde(default)]
    #[builder(into)]
    exclude_dirs: Option<String>,
    /// Unanchored archive tool patterns such as `*.log`.
    #[serde(default)]
    #[builder(default)]
    extra_excludes: Vec<Arc<str>>,
    #[serde(default = "default_keep_days")]
    #[builder(default = default_keep_days())]
    keep_days: i64,
    /// Overrides the target directory name as the archive and prune slug.
    #[serde(default)]
    #[builder(into)]
    name_hint: Option<Arc<str>>,
    #[validate(custom(function = validate_not_blank))]
    #[serde(default = "default_tar_bin")]
    #[builder(default = default_tar_bin(), into)]
    tar_bin: Arc<str>,
}

#[derive(Debug)]
pub struct BackupOutcome {
    pub archive: Archive,
    pub pruned: PruneReport,
}

impl BackupJobConfig {
    fn effective_name_hint(&self, target: &Path) -> Arc<str> {
        match &self.name_hint {
            Some(hint) => hint.clone(),
            None => target
                .file_name()
                .map(|n| n.to_string_lossy().into())
                .unwrap_or_else(|| "".into()),
        }
    }

    /// Validates paths, writes today's archive, then prunes archives of the
    /// same source that fell out of the retention window.
    pub fn run(&self, now: DateTime<Utc>) -> Result<BackupOutcome> {
        self.run_inner(now)
            .with_debug_object_and_fn_name(self.clone(), "BackupJobConfig::run")
    }

    fn run_inner(&self, now: DateTime<Utc>) -> Result<BackupOutcome> {
        let (target, dest) = validate_paths(&self.target_dir, &self.dest_dir)?;
        let name_hint = self.effective_name_hint(&target);

        let archive = ArchiveBuilder::builder()
            .tar_bin(self.tar_bin.clone())
            .extra_excludes(self.extra_excludes.clone())
            .build()
            .build(
                &target,
                &dest,
                &slugify(name_hint.as_ref()),
                &ExclusionSet::parse(self.exclude_dirs.as_deref()),
                now,
            )?;

        let pruned = RetentionPolicy::builder()
            .keep_days(self.keep_days)
            .name_hint(name_hint)
            .build()
            .prune(&dest, now)?;
        for failure in &pruned.failures {
            warn!("Prune failed for {:?}: {}", failure.path, failure.error);
        }

        info!("Backup finished: {:?}", archive.path());
        Ok(BackupOutcome { archive, pruned })
    }
}
