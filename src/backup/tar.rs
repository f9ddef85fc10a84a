use crate::backup::exclusion::ExclusionSet;
use crate::backup::slug::Slug;
use crate::function_path;
use crate::result_error::error::Error;
use crate::result_error::result::Result;
use crate::result_error::WithMsg;
use bon::Builder;
use chrono::{DateTime, NaiveDate, Utc};
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use serde::Serialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

pub static TAR_FILE_EXT: &str = "tar";
static DATE_FORMAT: &str = "%Y-%m-%d";

pub fn default_tar_bin() -> Arc<str> {
    "tar".into()
}

/// `{YYYY-MM-DD}-{slug}.tar`
pub fn archive_file_name(date: NaiveDate, slug: &Slug) -> String {
    format!("{}-{}.{}", date.format(DATE_FORMAT), slug, TAR_FILE_EXT)
}

/// An archive written by [`ArchiveBuilder::build`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Archive {
    path: PathBuf,
    date: NaiveDate,
    slug: Slug,
    size: u64,
}

impl Archive {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

/// Runs the external archiving tool to write one dated archive of a directory.
#[derive(Clone, Debug, Builder)]
pub struct ArchiveBuilder {
    #[builder(default = default_tar_bin(), into)]
    tar_bin: Arc<str>,
    /// Unanchored patterns passed straight to the tool, e.g. `*.log`.
    #[builder(default, into)]
    extra_excludes: Vec<Arc<str>>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ArchiveBuilder {
    fn command_args(
        &self,
        target: &Path,
        archive: &Path,
        exclusions: &ExclusionSet,
    ) -> Vec<OsString> {
        exclusions
            .tar_args()
            .into_iter()
            .chain(self.extra_excludes.iter().map(|ex| format!("--exclude={ex}")))
            .map(OsString::from)
            .chain([
                "-cf".into(),
                archive.as_os_str().to_owned(),
                "-C".into(),
                target.as_os_str().to_owned(),
                ".".into(),
            ])
            .collect()
    }

    /// Archives everything under `target` into `dest/{date}-{slug}.tar`.
    ///
    /// An archive with the same name from earlier the same UTC day is
    /// overwritten. When the tool fails the partial file is removed.
    #[named]
    pub fn build<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        target: P1,
        dest: P2,
        slug: &Slug,
        exclusions: &ExclusionSet,
        now: DateTime<Utc>,
    ) -> Result<Archive> {
        let target = target.as_ref();
        let date = now.date_naive();
        let path = dest.as_ref().join(archive_file_name(date, slug));

        let args = self.command_args(target, &path, exclusions);
        let command = std::iter::once(self.tar_bin.to_string())
            .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
            .join(" ");
        tracing::info!("Running: {command}");

        let output = Command::new(self.tar_bin.as_ref())
            .args(&args)
            .output()
            .map_err(Error::from)
            .with_msg(format!("Spawning {:?} failed at {}", self.tar_bin, function_path!()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("Archive command failed ({}): {}", output.status, stderr);
            match std::fs::remove_file(&path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    tracing::warn!("Removing partial archive {:?} failed: {}", path, e)
                }
                _ => {}
            }
            return Err(Error::ArchiveCreationFailed {
                command,
                status: output.status,
                stderr,
            });
        }

        let size = std::fs::metadata(&path)
            .map_err(Error::from)
            .with_msg(format!("Reading created archive {:?} failed", path))?
            .len();
        let archive = Archive {
            path,
            date,
            slug: slug.clone(),
            size,
        };
        tracing::info!("Created: {:?} ({:.1} MB)", archive.path, archive.size_mb());
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::slug::slugify;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir.join("cache/deep"))?;
        std::fs::create_dir_all(dir.join("keep"))?;
        std::fs::write(dir.join("cache/file.txt"), "cached")?;
        std::fs::write(dir.join("cache/deep/inner.txt"), "cached")?;
        std::fs::write(dir.join("keep/file.txt"), "kept")?;
        std::fs::write(dir.join("keep/debug.log"), "noise")?;
        std::fs::write(dir.join("root.txt"), "root")?;
        Ok(())
    }

    fn archived_files(path: &Path) -> HashSet<String> {
        let mut archive = ::tar::Archive::new(std::fs::File::open(path).unwrap());
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.header().entry_type().is_file())
            .map(|e| {
                let p = e.path().unwrap().to_string_lossy().into_owned();
                p.trim_start_matches("./").to_string()
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 0).unwrap()
    }

    #[test]
    fn test_archive_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            archive_file_name(date, &slugify("Static Server")),
            "2024-03-05-static-server.tar"
        );
        assert_eq!(
            archive_file_name(date, &slugify("static_server")),
            "2024-03-05-static_server.tar"
        );
    }

    #[test]
    fn test_command_args_order() {
        let builder = ArchiveBuilder::builder()
            .extra_excludes(vec![Arc::from("*.log")])
            .build();
        let args = builder.command_args(
            Path::new("/src"),
            Path::new("/dst/a.tar"),
            &ExclusionSet::parse(Some("cache")),
        );

        assert_eq!(
            args,
            vec![
                "--exclude=./cache",
                "--exclude=./cache/*",
                "--exclude=*.log",
                "-cf",
                "/dst/a.tar",
                "-C",
                "/src",
                ".",
            ]
        );
    }

    #[test]
    fn test_build_excludes_directory_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("static_server");
        let dest = temp_dir.path().join("dest");
        std::fs::create_dir_all(&dest).unwrap();
        create_test_files(&target).unwrap();

        let archive = ArchiveBuilder::default()
            .build(
                &target,
                &dest,
                &slugify("static_server"),
                &ExclusionSet::parse(Some("cache")),
                now(),
            )
            .unwrap();

        assert_eq!(archive.path(), &dest.join("2024-03-05-static_server.tar"));
        assert!(*archive.size() > 0);
        let files = archived_files(archive.path());
        assert!(files.contains("keep/file.txt"));
        assert!(files.contains("root.txt"));
        assert!(files.iter().all(|f| !f.starts_with("cache")), "{files:?}");
    }

    #[test]
    fn test_build_extra_excludes() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("src");
        create_test_files(&target).unwrap();

        let archive = ArchiveBuilder::builder()
            .extra_excludes(vec![Arc::from("*.log")])
            .build()
            .build(
                &target,
                temp_dir.path(),
                &slugify("src"),
                &ExclusionSet::default(),
                now(),
            )
            .unwrap();

        let files = archived_files(archive.path());
        assert!(files.contains("cache/deep/inner.txt"));
        assert!(!files.contains("keep/debug.log"));
    }

    #[test]
    fn test_build_overwrites_same_day() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("src");
        create_test_files(&target).unwrap();
        let dest = temp_dir.path().join("dest");
        std::fs::create_dir_all(&dest).unwrap();
        let existing = dest.join("2024-03-05-src.tar");
        std::fs::write(&existing, "stale").unwrap();

        let archive = ArchiveBuilder::default()
            .build(&target, &dest, &slugify("src"), &ExclusionSet::default(), now())
            .unwrap();

        assert_eq!(archive.path(), &existing);
        assert!(archived_files(&existing).contains("root.txt"));
    }

    #[test]
    fn test_build_tool_failure() {
        let temp_dir = TempDir::new().unwrap();
        let builder = ArchiveBuilder::builder().tar_bin("false").build();

        let res = builder.build(
            temp_dir.path(),
            temp_dir.path(),
            &slugify("x"),
            &ExclusionSet::default(),
            now(),
        );

        assert!(matches!(res, Err(Error::ArchiveCreationFailed { .. })));
        assert!(!temp_dir.path().join("2024-03-05-x.tar").exists());
    }

    #[test]
    fn test_build_missing_tool() {
        let temp_dir = TempDir::new().unwrap();
        let builder = ArchiveBuilder::builder()
            .tar_bin("/nonexistent/k-housekeeping-tar")
            .build();

        let res = builder.build(
            temp_dir.path(),
            temp_dir.path(),
            &slugify("x"),
            &ExclusionSet::default(),
            now(),
        );

        assert!(matches!(res.unwrap_err().root_cause(), Error::Io(_)));
    }
}
