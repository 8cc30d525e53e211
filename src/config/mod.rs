//! Layered `testme.json5` configuration: discovery up the directory tree,
//! JSON5 parsing, merge-down resolution, and post-merge variable expansion.
pub mod merge;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::compiler::flags;
use crate::error::{Result, TestmeError};
use crate::expand::{self, ExpandInput, SpecialVariables};
use merge::RawTestConfig;
pub use schema::TestConfig;

pub const CONFIG_FILE_NAME: &str = "testme.json5";

/// A loaded config file paired with the directory it was found in, so flag
/// paths can later be resolved relative to the file that contributed them.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub dir: PathBuf,
    pub raw: RawTestConfig,
}

/// Walk from `start_dir` up to the filesystem root, collecting every
/// `testme.json5` found along the way. Returned outermost-first (root
/// ancestor first, `start_dir`'s own config last) so callers can fold them
/// in merge order.
pub fn find_config_chain(start_dir: &Path) -> Result<Vec<ConfigLayer>> {
    let mut layers = Vec::new();
    let mut current = Some(start_dir.to_path_buf());

    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            let raw = load_raw(&candidate)?;
            layers.push(ConfigLayer { dir: dir.clone(), raw });
        }
        current = dir.parent().map(|p| p.to_path_buf());
    }

    layers.reverse();
    Ok(layers)
}

/// Parse a single `testme.json5` file, logging (not failing on) unknown
/// top-level keys.
fn load_raw(path: &Path) -> Result<RawTestConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| TestmeError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut raw: RawTestConfig = json5::from_str(&text).map_err(|e| TestmeError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    for key in raw.unknown.keys() {
        warn!(config = %path.display(), key = %key, "unknown configuration key");
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_layer_flag_paths(&mut raw, dir);

    Ok(raw)
}

/// Resolve every `-I`/`-L`/`/I`/`/LIBPATH:` flag this layer contributes to an
/// absolute path, rooted at `dir` (this layer's own directory). Must happen
/// before layers are merged: once folded into one array, a parent's and a
/// child's identical-looking relative flag can no longer be told apart.
fn resolve_layer_flag_paths(raw: &mut RawTestConfig, dir: &Path) {
    let Some(compiler) = raw.compiler.as_mut() else { return };
    let Some(c) = compiler.c.as_mut() else { return };

    if let Some(f) = c.flags.as_mut() {
        *f = flags::resolve_relative_paths(f, dir);
    }
    for variant in [&mut c.gcc, &mut c.clang, &mut c.msvc, &mut c.mingw] {
        if let Some(v) = variant.as_mut() {
            v.flags = flags::resolve_relative_paths(&v.flags, dir);
        }
    }
}

/// Fold a chain of layers (outermost-first) plus an optional CLI overlay
/// into a single resolved [`TestConfig`].
pub fn resolve(layers: &[ConfigLayer], cli_overlay: Option<&RawTestConfig>) -> TestConfig {
    let mut config = TestConfig::default();
    for layer in layers {
        config = merge::merge(&config, &layer.raw);
    }
    if let Some(overlay) = cli_overlay {
        config = merge::merge(&config, overlay);
    }
    config
}

/// Find and resolve the effective configuration governing `test_dir`,
/// expanding `${...}` tokens in path-bearing fields against `vars`.
///
/// Returns the resolved config and the directory of the nearest contributing
/// `testme.json5` (the "config directory" used for `CONFIGDIR` and as the
/// working directory for service prep/setup), or `None` if no config file
/// was found anywhere in the ancestry.
pub fn load_for_dir(
    test_dir: &Path,
    cli_overlay: Option<&RawTestConfig>,
) -> Result<(TestConfig, Option<PathBuf>)> {
    let layers = find_config_chain(test_dir)?;
    let config_dir = layers.last().map(|l| l.dir.clone());
    let config = resolve(&layers, cli_overlay);
    Ok((config, config_dir))
}

/// Expand every path-bearing field of `config` (compiler flags/libraries,
/// include/exclude patterns, env values) against `vars`, rooted at
/// `base_dir` (the config's own directory).
pub fn expand_paths(config: &TestConfig, base_dir: &Path, vars: &SpecialVariables) -> TestConfig {
    let mut expanded = config.clone();

    expanded.compiler.c.flags = expand_list(&config.compiler.c.flags, base_dir, vars);
    expanded.compiler.c.libraries = expand_list(&config.compiler.c.libraries, base_dir, vars);
    for variant in [
        &mut expanded.compiler.c.gcc,
        &mut expanded.compiler.c.clang,
        &mut expanded.compiler.c.msvc,
        &mut expanded.compiler.c.mingw,
    ] {
        variant.flags = variant
            .flags
            .iter()
            .flat_map(|f| expand::expand(&ExpandInput::Scalar(f.clone()), base_dir, vars))
            .map(|f| expand::normalize_rpath(&f))
            .collect();
        variant.libraries = expand_list(&variant.libraries, base_dir, vars);
    }

    expanded.patterns.include = expand_list(&config.patterns.include, base_dir, vars);
    expanded.patterns.exclude = expand_list(&config.patterns.exclude, base_dir, vars);

    expanded.env = config
        .env
        .iter()
        .map(|(k, v)| {
            let expanded_v = expand::expand(&ExpandInput::Scalar(v.clone()), base_dir, vars);
            (k.clone(), expanded_v.into_iter().next().unwrap_or_default())
        })
        .collect::<HashMap<_, _>>();

    expanded
}

fn expand_list(items: &[String], base_dir: &Path, vars: &SpecialVariables) -> Vec<String> {
    expand::expand(&ExpandInput::List(items.to_vec()), base_dir, vars)
}
