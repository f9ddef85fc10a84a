use crate::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Glob(#[from] globset::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Backup source is missing or is not a directory.
    #[error("target_dir does not exist or is not a directory: {path:?}")]
    InvalidSource { path: PathBuf },
    /// The write probe in the destination directory failed.
    #[error("dest_dir is not writable: {path:?}: {source}")]
    DestinationNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The external archiving tool exited with a non-zero status.
    #[error(
        "archive command `{command}` failed ({status}):\n{}",
        indent::indent_all_with("  ", stderr)
    )]
    ArchiveCreationFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    /// Ownership normalization root is missing.
    #[error("Root path does not exist: {path:?}")]
    RootNotFound { path: PathBuf },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error(
        "{:?} {} failed:\n{}",
        obj_debug,
        fn_name,
        indent::indent_all_with("  ", error.to_string())
    )]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(Error::into_iter).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    /// Strips message and function-name context down to the underlying error.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithDebugObjAndFnName { error, .. } => {
                error.root_cause()
            }
            e => e,
        }
    }
}
