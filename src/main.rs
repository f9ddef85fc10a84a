use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use k_housekeeping::backup::backup_config::BackupJobConfig;
use k_housekeeping::backup::retention::DEFAULT_KEEP_DAYS;
use k_housekeeping::jobs::{JobOutput, JobsConfig};
use k_housekeeping::ownership::{OwnershipConfig, DEFAULT_GID, DEFAULT_UID};
use k_housekeeping::result_error::error::Error;
use k_housekeeping::result_error::result::Result;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Dated tar backups with scoped retention, and recursive ownership fixes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive a directory into DEST_DIR/YYYY-MM-DD-<name>.tar and prune old archives of it
    Backup {
        #[arg(long, env = "TARGET_DIR")]
        target_dir: PathBuf,
        #[arg(long, env = "DEST_DIR")]
        dest_dir: PathBuf,
        /// Comma separated directories relative to TARGET_DIR
        #[arg(long, env = "EXCLUDE_DIRS")]
        exclude_dirs: Option<String>,
        /// Extra unanchored tar exclude pattern, may repeat
        #[arg(long = "extra-exclude")]
        extra_excludes: Vec<String>,
        /// Days to keep archives, below 1 keeps them forever
        #[arg(
            long,
            env = "KEEP_DAYS",
            default_value_t = DEFAULT_KEEP_DAYS,
            allow_negative_numbers = true
        )]
        keep_days: i64,
        /// Name used for the archive slug instead of the target directory name
        #[arg(long)]
        name_hint: Option<String>,
        #[arg(long, default_value = "tar")]
        tar_bin: String,
    },
    /// Recursively chown everything under ROOT to UID:GID
    FixOwnership {
        #[arg(long, default_value = "/srv/homelab/state")]
        root: PathBuf,
        #[arg(long, default_value_t = DEFAULT_UID)]
        uid: u32,
        #[arg(long, default_value_t = DEFAULT_GID)]
        gid: u32,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        include_dirs: bool,
    },
    /// Run every job of a YAML job file in order
    Run {
        /// Location of job file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn print_output(output: &JobOutput) -> Result<()> {
    match output {
        JobOutput::Backup(outcome) => println!("{}", outcome.archive.path().display()),
        JobOutput::Ownership(result) => println!("{}", serde_json::to_string(result)?),
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    let now = Utc::now();
    match command {
        Command::Backup {
            target_dir,
            dest_dir,
            exclude_dirs,
            extra_excludes,
            keep_days,
            name_hint,
            tar_bin,
        } => {
            let job = BackupJobConfig::builder()
                .target_dir(target_dir)
                .dest_dir(dest_dir)
                .maybe_exclude_dirs(exclude_dirs)
                .extra_excludes(extra_excludes.into_iter().map(Arc::from).collect())
                .keep_days(keep_days)
                .maybe_name_hint(name_hint.map(Arc::from))
                .tar_bin(tar_bin)
                .build();
            job.validate()?;
            print_output(&job.run(now)?.into())
        }
        Command::FixOwnership {
            root,
            uid,
            gid,
            dry_run,
            include_dirs,
        } => {
            let job = OwnershipConfig::builder()
                .root(root)
                .uid(uid)
                .gid(gid)
                .dry_run(dry_run)
                .include_dirs(include_dirs)
                .build();
            print_output(&job.normalize()?.into())
        }
        Command::Run { config } => {
            let config = JobsConfig::from_path(&config)?;
            let (outputs, error) = config.run_all(now);
            outputs.iter().try_for_each(print_output)?;
            error.map_or(Ok(()), Err)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    if let Err(e) = run(args.command) {
        match e {
            Error::LotsOfError(errors) => {
                error!("{} job(s) failed", errors.len());
            }
            e => error!("{e}"),
        }
        exit(1);
    }
}
