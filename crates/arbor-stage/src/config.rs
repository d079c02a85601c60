//! Session configuration, loadable from TOML.

use arbor_store::EntryMode;
use serde::{Deserialize, Serialize};

use crate::error::{StageError, StageResult};

/// What happens to a directory that ends up with no entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyDirPolicy {
    /// Write it as an empty tree and keep it in its parent.
    #[default]
    Keep,
    /// Drop it from its parent. Cascades: a parent emptied by the drop is
    /// pruned too. The root is always written.
    Prune,
}

/// Configuration for staging sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    /// Policy for directories emptied by removals.
    pub empty_dirs: EmptyDirPolicy,
    /// Mode used by `add` when the caller does not pass one.
    pub default_mode: EntryMode,
    /// Ref moved by `commit` when the request does not name one.
    pub default_ref: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            empty_dirs: EmptyDirPolicy::Keep,
            default_mode: EntryMode::Regular,
            default_ref: arbor_refs::HEAD.to_string(),
        }
    }
}

impl StageConfig {
    /// A configuration that prunes emptied directories.
    pub fn pruning() -> Self {
        Self {
            empty_dirs: EmptyDirPolicy::Prune,
            ..Default::default()
        }
    }

    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StageResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StageResult<()> {
        if self.default_mode.is_dir() {
            return Err(StageError::Config(
                "default_mode must be a file mode".to_string(),
            ));
        }
        if self.default_ref.is_empty() {
            return Err(StageError::Config("default_ref must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StageConfig::default();
        assert_eq!(c.empty_dirs, EmptyDirPolicy::Keep);
        assert_eq!(c.default_mode, EntryMode::Regular);
        assert_eq!(c.default_ref, "HEAD");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_overrides_and_defaults() {
        let c = StageConfig::from_toml_str(
            r#"
            empty_dirs = "prune"
            default_mode = "executable"
            "#,
        )
        .unwrap();
        assert_eq!(c.empty_dirs, EmptyDirPolicy::Prune);
        assert_eq!(c.default_mode, EntryMode::Executable);
        assert_eq!(c.default_ref, "HEAD");
    }

    #[test]
    fn modes_and_policies_share_one_casing() {
        let c = StageConfig::from_toml_str(
            r#"
            empty_dirs = "keep"
            default_mode = "symlink"
            "#,
        )
        .unwrap();
        assert_eq!(c.default_mode, EntryMode::Symlink);
        assert!(StageConfig::from_toml_str("default_mode = \"Executable\"").is_err());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(StageConfig::from_toml_str("").unwrap(), StageConfig::default());
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(matches!(
            StageConfig::from_toml_str("colour = \"blue\""),
            Err(StageError::Config(_))
        ));
    }

    #[test]
    fn toml_rejects_directory_default_mode() {
        assert!(matches!(
            StageConfig::from_toml_str("default_mode = \"directory\""),
            Err(StageError::Config(_))
        ));
    }

    #[test]
    fn pruning_preset() {
        assert_eq!(StageConfig::pruning().empty_dirs, EmptyDirPolicy::Prune);
    }
}
