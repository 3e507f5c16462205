use crate::constants::{ENV_PARTITIONS, ENV_REDUCERS, ENV_SKIP_COMBINERS, ENV_THREADS};
use crate::error::JobError;
use crate::utils::{env_var_parse, env_var_truthy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine tuning, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Size of the worker pool.
    pub threads: usize,
    /// Number of map partitions the input is split into.
    pub partitions: usize,
    /// Number of reduce buckets keys are hashed into.
    pub reducers: usize,
    /// Run stage combiners on the mapper side.
    pub use_combiners: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        ConfigLayer::default().build()
    }
}

/// One source of settings: the JSON file, the environment or command-line
/// flags. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub threads: Option<usize>,
    pub partitions: Option<usize>,
    pub reducers: Option<usize>,
    pub use_combiners: Option<bool>,
}

impl ConfigLayer {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let layer: ConfigLayer =
            serde_json::from_str(&contents).with_context(|| format!("parse config {}", path.display()))?;
        Ok(layer)
    }

    pub fn from_env() -> Self {
        Self {
            threads: env_var_parse(ENV_THREADS),
            partitions: env_var_parse(ENV_PARTITIONS),
            reducers: env_var_parse(ENV_REDUCERS),
            use_combiners: env_var_truthy(ENV_SKIP_COMBINERS).then_some(false),
        }
    }

    /// Fields set here win over `lower`.
    pub fn over(self, lower: ConfigLayer) -> Self {
        Self {
            threads: self.threads.or(lower.threads),
            partitions: self.partitions.or(lower.partitions),
            reducers: self.reducers.or(lower.reducers),
            use_combiners: self.use_combiners.or(lower.use_combiners),
        }
    }

    /// Fills the gaps: threads from the CPU count, partitions from threads,
    /// reducers from partitions.
    pub fn build(self) -> EngineConfig {
        let threads = self.threads.unwrap_or_else(|| num_cpus::get().max(1));
        let partitions = self.partitions.unwrap_or(threads);
        EngineConfig {
            threads,
            partitions,
            reducers: self.reducers.unwrap_or(partitions),
            use_combiners: self.use_combiners.unwrap_or(true),
        }
    }
}

impl EngineConfig {
    /// Same partition and reducer count, sized for `workers` threads.
    pub fn with_workers(workers: usize) -> Self {
        ConfigLayer { threads: Some(workers), ..ConfigLayer::default() }.build()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(ConfigLayer::load(path)?.build())
    }

    /// Defaults, then the optional JSON file, then environment overrides, then
    /// `flags`. Sizes derived from `threads` follow the winning thread count unless a
    /// layer sets them explicitly.
    pub fn with_overrides(path: Option<&Path>, flags: ConfigLayer) -> Result<Self> {
        let file = match path {
            Some(p) => ConfigLayer::load(p)?,
            None => ConfigLayer::default(),
        };
        Ok(flags.over(ConfigLayer::from_env()).over(file).build())
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.threads == 0 {
            return Err(JobError::Config("threads must be at least 1".into()));
        }
        if self.partitions == 0 {
            return Err(JobError::Config("partitions must be at least 1".into()));
        }
        if self.reducers == 0 {
            return Err(JobError::Config("reducers must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "partitions": 3, "use_combiners": false }}"#).unwrap();
        let cfg = EngineConfig::load(f.path()).unwrap();
        assert_eq!(cfg.partitions, 3);
        assert_eq!(cfg.reducers, 3);
        assert!(!cfg.use_combiners);
        assert_eq!(cfg.threads, EngineConfig::default().threads);
    }

    #[test]
    fn thread_flag_resizes_underived_fields() {
        let flags = ConfigLayer { threads: Some(3), ..ConfigLayer::default() };
        let cfg = flags.over(ConfigLayer::default()).build();
        assert_eq!(cfg, EngineConfig { threads: 3, partitions: 3, reducers: 3, use_combiners: true });
    }

    #[test]
    fn explicit_lower_layer_sizes_survive_a_thread_flag() {
        let file = ConfigLayer { partitions: Some(8), use_combiners: Some(false), ..ConfigLayer::default() };
        let flags = ConfigLayer { threads: Some(2), ..ConfigLayer::default() };
        let cfg = flags.over(file).build();
        assert_eq!(cfg, EngineConfig { threads: 2, partitions: 8, reducers: 8, use_combiners: false });
    }

    #[test]
    fn file_and_flags_combine() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "reducers": 5 }}"#).unwrap();
        let flags = ConfigLayer { threads: Some(2), partitions: Some(6), ..ConfigLayer::default() };
        let cfg = EngineConfig::with_overrides(Some(f.path()), flags).unwrap();
        assert_eq!((cfg.threads, cfg.partitions, cfg.reducers), (2, 6, 5));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut cfg = EngineConfig::with_workers(2);
        assert!(cfg.validate().is_ok());
        cfg.reducers = 0;
        assert!(matches!(cfg.validate(), Err(JobError::Config(_))));
    }
}
