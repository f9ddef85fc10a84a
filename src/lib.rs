//! # k-housekeeping
//!
//! Scheduled filesystem maintenance for a small self-hosted setup.
//!
//! ## Features
//!
//! - **Dated Archives**: `YYYY-MM-DD-<slug>.tar` written by the system `tar`
//! - **Directory Exclusions**: anchored at the archive root, subtree included
//! - **Scoped Retention**: only archives of the same source are pruned, so many
//!   jobs can share one destination directory
//! - **Ownership Normalization**: recursive `chown` with per-path accounting
//!
//! ## Quick Start
//!
//! ```no_run
//! use k_housekeeping::jobs::JobsConfig;
//!
//! let config = JobsConfig::from_path("jobs.yml")?;
//! let (outputs, error) = config.run_all(chrono::Utc::now());
//! # let _ = (outputs, error);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
pub mod jobs;
pub mod ownership;
pub mod result_error;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
