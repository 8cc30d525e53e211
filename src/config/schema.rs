//! Configuration schema: the raw (all-optional, per-file) shape and the
//! fully-resolved shape used by the rest of the engine.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `enable` section: `true`, `false`, or `'manual'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enable {
    True,
    False,
    Manual,
}

impl Default for Enable {
    fn default() -> Self {
        Enable::True
    }
}

/// Custom (de)serialization so `enable: true` and `enable: 'manual'` both
/// parse directly from JSON5 without an intermediate string.
impl<'de> serde::de::Deserialize<'de> for EnableValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        struct Visitor;
        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = EnableValue;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a bool or the string 'manual'")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
                Ok(EnableValue(if v { Enable::True } else { Enable::False }))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v.eq_ignore_ascii_case("manual") {
                    Ok(EnableValue(Enable::Manual))
                } else {
                    Err(E::custom(format!("invalid enable value: {v}")))
                }
            }
        }
        deserializer.deserialize_any(Visitor)
    }
}

impl serde::ser::Serialize for EnableValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self.0 {
            Enable::True => serializer.serialize_bool(true),
            Enable::False => serializer.serialize_bool(false),
            Enable::Manual => serializer.serialize_str("manual"),
        }
    }
}

/// Newtype wrapper so `enable`'s custom bool-or-string deserialization
/// doesn't have to be reimplemented on [`Enable`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableValue(pub Enable);

/// Per-compiler flag/library overrides (`gcc`, `clang`, `msvc`, `mingw`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerVariant {
    pub flags: Vec<String>,
    pub libraries: Vec<String>,
}

/// `compiler.c` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CCompilerConfig {
    pub compiler: Option<String>,
    pub flags: Vec<String>,
    pub libraries: Vec<String>,
    pub gcc: CompilerVariant,
    pub clang: CompilerVariant,
    pub msvc: CompilerVariant,
    pub mingw: CompilerVariant,
}

/// `compiler.es` section: preload module list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EsCompilerConfig {
    pub preload: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSection {
    pub c: CCompilerConfig,
    pub es: EsCompilerConfig,
}

/// `execution` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout: u64,
    pub parallel: bool,
    pub workers: usize,
    pub depth: u32,
    pub iterations: u32,
    pub keep: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: 30_000,
            parallel: true,
            workers: default_workers(),
            depth: 0,
            iterations: 1,
            keep: false,
        }
    }
}

pub fn default_workers() -> usize {
    4.min(num_cpus::get().max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatKind {
    Simple,
    Detailed,
    Json,
}

impl Default for OutputFormatKind {
    fn default() -> Self {
        OutputFormatKind::Simple
    }
}

/// `output` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub verbose: bool,
    pub quiet: bool,
    pub format: OutputFormatKind,
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            quiet: false,
            format: OutputFormatKind::default(),
            colors: true,
        }
    }
}

/// `patterns` section: include/exclude glob lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// `services` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub skip: Option<String>,
    pub prep: Option<String>,
    pub setup: Option<String>,
    pub cleanup: Option<String>,
    #[serde(rename = "skipTimeout")]
    pub skip_timeout: Option<u64>,
    #[serde(rename = "prepTimeout")]
    pub prep_timeout: Option<u64>,
    #[serde(rename = "setupTimeout")]
    pub setup_timeout: Option<u64>,
    #[serde(rename = "cleanupTimeout")]
    pub cleanup_timeout: Option<u64>,
    pub delay: Option<u64>,
    #[serde(rename = "shutdownTimeout")]
    pub shutdown_timeout: Option<u64>,
}

impl ServicesConfig {
    pub fn skip_timeout_ms(&self) -> u64 {
        self.skip_timeout.unwrap_or(30_000)
    }
    pub fn prep_timeout_ms(&self) -> u64 {
        self.prep_timeout.unwrap_or(30_000)
    }
    pub fn setup_timeout_ms(&self) -> u64 {
        self.setup_timeout.unwrap_or(1_000)
    }
    pub fn cleanup_timeout_ms(&self) -> u64 {
        self.cleanup_timeout.unwrap_or(30_000)
    }
    pub fn delay_ms(&self) -> u64 {
        self.delay.unwrap_or(0)
    }
    pub fn shutdown_timeout_ms(&self) -> u64 {
        self.shutdown_timeout.unwrap_or(5_000)
    }
}

/// Named configuration sections usable in an `inherit` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InheritSection {
    Env,
    Compiler,
    Patterns,
    Services,
}

pub fn default_inherit() -> Vec<InheritSection> {
    vec![
        InheritSection::Env,
        InheritSection::Compiler,
        InheritSection::Patterns,
        InheritSection::Services,
    ]
}

/// Fully-resolved configuration, as returned by [`crate::config::find_config`]
/// after merging every ancestor layer, the CLI overlay, and variable
/// expansion. No field is optional here — unset values were already filled
/// from built-in defaults during the merge.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub enable: Enable,
    pub depth: u32,
    pub profile: String,
    pub inherit: Vec<InheritSection>,
    pub compiler: CompilerSection,
    pub execution: ExecutionConfig,
    pub output: OutputConfig,
    pub patterns: PatternsConfig,
    pub services: ServicesConfig,
    pub env: HashMap<String, String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            enable: Enable::True,
            depth: 0,
            profile: "dev".to_string(),
            inherit: default_inherit(),
            compiler: CompilerSection::default(),
            execution: ExecutionConfig::default(),
            output: OutputConfig::default(),
            patterns: PatternsConfig::default(),
            services: ServicesConfig::default(),
            env: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = TestConfig::default();
        assert_eq!(config.enable, Enable::True);
        assert_eq!(config.depth, 0);
        assert_eq!(config.execution.timeout, 30_000);
        assert!(config.execution.workers >= 1);
        assert_eq!(config.output.format, OutputFormatKind::Simple);
    }

    #[test]
    fn default_inherit_set_matches_spec() {
        let set = default_inherit();
        assert!(set.contains(&InheritSection::Env));
        assert!(set.contains(&InheritSection::Compiler));
        assert!(set.contains(&InheritSection::Patterns));
        assert!(set.contains(&InheritSection::Services));
    }

    #[test]
    fn services_config_defaults_match_spec_timeouts() {
        let services = ServicesConfig::default();
        assert_eq!(services.skip_timeout_ms(), 30_000);
        assert_eq!(services.prep_timeout_ms(), 30_000);
        assert_eq!(services.setup_timeout_ms(), 1_000);
        assert_eq!(services.delay_ms(), 0);
        assert_eq!(services.shutdown_timeout_ms(), 5_000);
    }
}
