//! Job file: a YAML list of backup and ownership jobs run one after another.
//!
//! ```yaml
//! jobs:
//!   - type: backup
//!     target_dir: /srv/homelab/state/static_server
//!     dest_dir: /mnt/mediaserve/static_server
//!     exclude_dirs: cache,logs
//!     keep_days: 10
//!   - type: ownership
//!     root: /srv/homelab/state
//!     uid: 1000
//!     gid: 1000
//! ```

use crate::backup::backup_config::{BackupJobConfig, BackupOutcome};
use crate::ownership::{OwnershipConfig, OwnershipJobResult};
use crate::result_error::error::Error;
use crate::result_error::result::{convert_error_vec, Result};
use crate::result_error::{WithDebugObjectAndFnName, WithMsg};
use chrono::{DateTime, Utc};
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::result;
use validator::{Validate, ValidationErrors};

#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum JobConfig {
    Backup(BackupJobConfig),
    Ownership(OwnershipConfig),
}

impl Validate for JobConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            Self::Backup(inner) => inner.validate(),
            Self::Ownership(inner) => inner.validate(),
        }
    }
}

#[derive(Debug, From)]
pub enum JobOutput {
    Backup(BackupOutcome),
    Ownership(OwnershipJobResult),
}

impl JobConfig {
    pub fn run(&self, now: DateTime<Utc>) -> Result<JobOutput> {
        match self {
            Self::Backup(job) => job.run(now).map(JobOutput::from),
            Self::Ownership(job) => job
                .normalize()
                .map(JobOutput::from)
                .with_debug_object_and_fn_name(job.clone(), "OwnershipConfig::normalize"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Validate)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    #[validate(nested)]
    pub jobs: Vec<JobConfig>,
}

impl JobsConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Open job file failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, JobsConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|jc| {
                jc.validate()
                    .map_err(Error::from)
                    .map(|_| jc)
                    .with_msg(format!("Config validation failed: {:?}", path))
            })
    }

    /// Runs every job in order. A failing job does not stop the ones after it;
    /// all failures come back together.
    pub fn run_all(&self, now: DateTime<Utc>) -> (Vec<JobOutput>, Option<Error>) {
        let mut outputs = Vec::with_capacity(self.jobs.len());
        let mut errors = vec![];
        for (idx, job) in self.jobs.iter().enumerate() {
            match job.run(now).with_msg(format!("Job #{idx} failed")) {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    tracing::error!("{e}");
                    errors.push(e)
                }
            }
        }

        (outputs, convert_error_vec(errors).err())
    }
}
