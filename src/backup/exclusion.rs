use derive_more::{Deref, From};
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;

/// Directories to leave out of an archive, relative to the archive root.
///
/// Entries never start or end with `/` and are never empty.
#[derive(Clone, Debug, Default, Deref, From, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExclusionSet(Vec<Arc<str>>);

impl ExclusionSet {
    /// Parses a comma separated list such as `"cache, /logs/ ,tmp/"`.
    pub fn parse(list: Option<&str>) -> Self {
        let Some(list) = list else {
            return Self::default();
        };

        list.split(',')
            .map(|p| p.trim().trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(Arc::from)
            .collect_vec()
            .into()
    }

    /// Archive tool arguments excluding each directory and everything under it,
    /// anchored at the archive root.
    pub fn tar_args(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|ex| [format!("--exclude=./{ex}"), format!("--exclude=./{ex}/*")])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strs(set: &ExclusionSet) -> Vec<&str> {
        set.iter().map(|s| s.as_ref()).collect()
    }

    #[test]
    fn test_parse_trims_and_drops_empty() {
        let set = ExclusionSet::parse(Some("a, /b/, ,c/"));
        assert_eq!(as_strs(&set), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_none_and_blank() {
        assert!(ExclusionSet::parse(None).is_empty());
        assert!(ExclusionSet::parse(Some("")).is_empty());
        assert!(ExclusionSet::parse(Some(" , // ,")).is_empty());
    }

    #[test]
    fn test_parse_keeps_nested_paths() {
        let set = ExclusionSet::parse(Some("/var/cache/, node_modules"));
        assert_eq!(as_strs(&set), vec!["var/cache", "node_modules"]);
    }

    #[test]
    fn test_tar_args_cover_dir_and_children() {
        let set = ExclusionSet::parse(Some("cache,logs/old"));
        assert_eq!(
            set.tar_args(),
            vec![
                "--exclude=./cache",
                "--exclude=./cache/*",
                "--exclude=./logs/old",
                "--exclude=./logs/old/*",
            ]
        );
    }

    #[test]
    fn test_tar_args_empty() {
        assert!(ExclusionSet::default().tar_args().is_empty());
    }
}
