//! Path checks run before archiving, plus custom `validator` functions for
//! job configuration fields.

use crate::result_error::error::Error;
use crate::result_error::result::Result;
use crate::result_error::WithMsg;
use validator::ValidationError;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Marker written and removed again to prove the destination accepts writes.
pub static WRITE_PROBE_FILE_NAME: &str = ".k_housekeeping_write_test";

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> std::result::Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

pub fn validate_not_blank<S: AsRef<str>>(value: S) -> std::result::Result<(), ValidationError> {
    if value.as_ref().trim().is_empty() {
        return Err(ValidationError::new("Blank").with_message("must not be blank".into()));
    }

    Ok(())
}

/// Resolves `target_dir` and `dest_dir`, creating `dest_dir` when missing and
/// probing it for write access.
///
/// Nothing is cached: every run checks the filesystem again.
pub fn validate_paths<P1: AsRef<Path>, P2: AsRef<Path>>(
    target_dir: P1,
    dest_dir: P2,
) -> Result<(PathBuf, PathBuf)> {
    let target_dir = target_dir.as_ref();
    let target = match target_dir.canonicalize() {
        Ok(t) if t.is_dir() => t,
        Ok(t) => return Err(Error::InvalidSource { path: t }),
        Err(_) => {
            return Err(Error::InvalidSource {
                path: std::path::absolute(target_dir).unwrap_or_else(|_| target_dir.into()),
            })
        }
    };

    let dest_dir = std::path::absolute(dest_dir.as_ref())?;
    std::fs::create_dir_all(&dest_dir)
        .map_err(Error::from)
        .with_msg(format!("Create dest_dir {:?} failed", dest_dir))?;
    let dest = dest_dir.canonicalize()?;

    probe_write(&dest)?;

    tracing::info!("Target: {:?}", target);
    tracing::info!("Dest:   {:?}", dest);
    Ok((target, dest))
}

fn probe_write(dir: &Path) -> Result<()> {
    let probe = dir.join(WRITE_PROBE_FILE_NAME);
    let written = std::fs::write(&probe, "ok");

    match std::fs::remove_file(&probe) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            tracing::warn!("Removing write probe {:?} failed: {}", probe, e)
        }
        _ => {}
    }

    written.map_err(|source| Error::DestinationNotWritable {
        path: dir.to_path_buf(),
        source,
    })
}
