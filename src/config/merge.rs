//! The raw (all-optional) configuration shape read directly off disk, and
//! the merge algebra that folds a stack of layers into a resolved
//! [`super::schema::TestConfig`].
use std::collections::HashMap;

use serde::Deserialize;

use super::schema::{
    CCompilerConfig, CompilerSection, CompilerVariant, EnableValue, EsCompilerConfig,
    ExecutionConfig, InheritSection, OutputConfig, PatternsConfig, ServicesConfig, TestConfig,
};

/// Raw `testme.json5` contents: every field optional so a layer can specify
/// only what it overrides. Unknown top-level keys are collected (rather than
/// rejected) so a warning can be logged instead of a hard parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTestConfig {
    pub enable: Option<EnableValue>,
    pub depth: Option<u32>,
    pub profile: Option<String>,
    pub inherit: Option<Vec<InheritSection>>,
    pub compiler: Option<RawCompilerSection>,
    pub execution: Option<RawExecutionConfig>,
    pub output: Option<RawOutputConfig>,
    pub patterns: Option<RawPatternsConfig>,
    pub services: Option<ServicesConfig>,
    pub env: Option<HashMap<String, String>>,

    #[serde(flatten)]
    pub unknown: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCompilerSection {
    pub c: Option<RawCCompilerConfig>,
    pub es: Option<EsCompilerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCCompilerConfig {
    pub compiler: Option<String>,
    pub flags: Option<Vec<String>>,
    pub libraries: Option<Vec<String>>,
    pub gcc: Option<CompilerVariant>,
    pub clang: Option<CompilerVariant>,
    pub msvc: Option<CompilerVariant>,
    pub mingw: Option<CompilerVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawExecutionConfig {
    pub timeout: Option<u64>,
    pub parallel: Option<bool>,
    pub workers: Option<usize>,
    pub depth: Option<u32>,
    pub iterations: Option<u32>,
    pub keep: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOutputConfig {
    pub verbose: Option<bool>,
    pub quiet: Option<bool>,
    pub format: Option<super::schema::OutputFormatKind>,
    pub colors: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPatternsConfig {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// Fold `child` onto `parent`, where `child` is the layer closer to the test
/// (read later, wins). `inherit` controls which sections from `parent` are
/// carried forward at all when `child` doesn't contribute to them:
/// sections not named in `inherit` reset to defaults once a layer in the
/// chain sets `inherit` to exclude them.
///
/// - Scalars: child's value wins if present, else parent's.
/// - Arrays: child replaces parent, *unless* the section is in the active
///   inherit set, in which case parent and child are concatenated and
///   deduplicated (order preserved, parent first).
/// - Maps (`env`, per-compiler flag maps): recursively merged key-by-key.
pub fn merge(parent: &TestConfig, child: &RawTestConfig) -> TestConfig {
    let inherit = child
        .inherit
        .clone()
        .unwrap_or_else(|| parent.inherit.clone());

    let inherits = |section: InheritSection| inherit.contains(&section);

    TestConfig {
        enable: child
            .enable
            .map(|e| e.0)
            .unwrap_or(parent.enable),
        depth: child.depth.unwrap_or(parent.depth),
        profile: child.profile.clone().unwrap_or_else(|| parent.profile.clone()),
        inherit,
        compiler: merge_compiler(&parent.compiler, child.compiler.as_ref(), inherits(InheritSection::Compiler)),
        execution: merge_execution(&parent.execution, child.execution.as_ref()),
        output: merge_output(&parent.output, child.output.as_ref()),
        patterns: merge_patterns(&parent.patterns, child.patterns.as_ref(), inherits(InheritSection::Patterns)),
        services: merge_services(&parent.services, child.services.as_ref(), inherits(InheritSection::Services)),
        env: merge_env(&parent.env, child.env.as_ref(), inherits(InheritSection::Env)),
    }
}

fn merge_array(parent: &[String], child: Option<&Vec<String>>, inherited: bool) -> Vec<String> {
    match child {
        None => parent.to_vec(),
        Some(c) if inherited => {
            let mut combined = parent.to_vec();
            for item in c {
                if !combined.contains(item) {
                    combined.push(item.clone());
                }
            }
            combined
        }
        Some(c) => c.clone(),
    }
}

fn merge_variant(parent: &CompilerVariant, child: Option<&CompilerVariant>, inherited: bool) -> CompilerVariant {
    match child {
        None => parent.clone(),
        Some(c) => CompilerVariant {
            flags: merge_array(&parent.flags, Some(&c.flags), inherited),
            libraries: merge_array(&parent.libraries, Some(&c.libraries), inherited),
        },
    }
}

fn merge_c_compiler(parent: &CCompilerConfig, child: Option<&RawCCompilerConfig>, inherited: bool) -> CCompilerConfig {
    let Some(child) = child else { return parent.clone() };
    CCompilerConfig {
        compiler: child.compiler.clone().or_else(|| parent.compiler.clone()),
        flags: merge_array(&parent.flags, child.flags.as_ref(), inherited),
        libraries: merge_array(&parent.libraries, child.libraries.as_ref(), inherited),
        gcc: merge_variant(&parent.gcc, child.gcc.as_ref(), inherited),
        clang: merge_variant(&parent.clang, child.clang.as_ref(), inherited),
        msvc: merge_variant(&parent.msvc, child.msvc.as_ref(), inherited),
        mingw: merge_variant(&parent.mingw, child.mingw.as_ref(), inherited),
    }
}

fn merge_compiler(parent: &CompilerSection, child: Option<&RawCompilerSection>, inherited: bool) -> CompilerSection {
    let Some(child) = child else { return parent.clone() };
    CompilerSection {
        c: merge_c_compiler(&parent.c, child.c.as_ref(), inherited),
        es: match &child.es {
            None => parent.es.clone(),
            Some(es) => EsCompilerConfig {
                preload: merge_array(&parent.es.preload, Some(&es.preload), inherited),
            },
        },
    }
}

fn merge_execution(parent: &ExecutionConfig, child: Option<&RawExecutionConfig>) -> ExecutionConfig {
    let Some(c) = child else { return parent.clone() };
    ExecutionConfig {
        timeout: c.timeout.unwrap_or(parent.timeout),
        parallel: c.parallel.unwrap_or(parent.parallel),
        workers: c.workers.unwrap_or(parent.workers),
        depth: c.depth.unwrap_or(parent.depth),
        iterations: c.iterations.unwrap_or(parent.iterations),
        keep: c.keep.unwrap_or(parent.keep),
    }
}

fn merge_output(parent: &OutputConfig, child: Option<&RawOutputConfig>) -> OutputConfig {
    let Some(c) = child else { return parent.clone() };
    OutputConfig {
        verbose: c.verbose.unwrap_or(parent.verbose),
        quiet: c.quiet.unwrap_or(parent.quiet),
        format: c.format.unwrap_or(parent.format),
        colors: c.colors.unwrap_or(parent.colors),
    }
}

fn merge_patterns(parent: &PatternsConfig, child: Option<&RawPatternsConfig>, inherited: bool) -> PatternsConfig {
    let Some(c) = child else { return parent.clone() };
    PatternsConfig {
        include: merge_array(&parent.include, c.include.as_ref(), inherited),
        exclude: merge_array(&parent.exclude, c.exclude.as_ref(), inherited),
    }
}

fn merge_services(parent: &ServicesConfig, child: Option<&ServicesConfig>, inherited: bool) -> ServicesConfig {
    let Some(c) = child else { return parent.clone() };
    if inherited {
        ServicesConfig {
            skip: c.skip.clone().or_else(|| parent.skip.clone()),
            prep: c.prep.clone().or_else(|| parent.prep.clone()),
            setup: c.setup.clone().or_else(|| parent.setup.clone()),
            cleanup: c.cleanup.clone().or_else(|| parent.cleanup.clone()),
            skip_timeout: c.skip_timeout.or(parent.skip_timeout),
            prep_timeout: c.prep_timeout.or(parent.prep_timeout),
            setup_timeout: c.setup_timeout.or(parent.setup_timeout),
            cleanup_timeout: c.cleanup_timeout.or(parent.cleanup_timeout),
            delay: c.delay.or(parent.delay),
            shutdown_timeout: c.shutdown_timeout.or(parent.shutdown_timeout),
        }
    } else {
        c.clone()
    }
}

fn merge_env(parent: &HashMap<String, String>, child: Option<&HashMap<String, String>>, inherited: bool) -> HashMap<String, String> {
    let Some(c) = child else { return parent.clone() };
    if inherited {
        let mut merged = parent.clone();
        for (k, v) in c {
            merged.insert(k.clone(), v.clone());
        }
        merged
    } else {
        c.clone()
    }
}
