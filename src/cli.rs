//! CLI option parsing. `main.rs` dispatches; this module only builds the
//! `clap::Parser` surface and translates it into the engine's own records.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;
use crate::scheduler::RunOptions;

#[derive(Debug, Parser)]
#[command(name = "testme")]
#[command(about = "Polyglot test runner for embedded/native development")]
pub struct App {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Name patterns to filter on, when no subcommand is given (implies `run`).
    #[arg(trailing_var_arg = true)]
    pub patterns: Vec<String>,

    #[command(flatten)]
    pub run_args: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover and run tests (the default when no subcommand is given)
    Run {
        /// Name patterns to filter which tests run
        patterns: Vec<String>,
        #[command(flatten)]
        args: RunArgs,
    },
    /// Discover tests and print them without running
    List {
        patterns: Vec<String>,
        #[command(flatten)]
        args: RunArgs,
    },
    /// Write a default testme.json5 in the current directory
    Init,
    /// Scaffold a new test file
    New {
        /// Test name (without the .tst.<ext> suffix)
        name: String,
        /// Extension / language tag (c, sh, py, js, ts, go, es, ps1, bat)
        #[arg(long, default_value = "c")]
        ext: String,
    },
    /// Manage testme.json5 configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration for the current directory
    Show,
    /// Set a configuration value in the nearest testme.json5 (not yet
    /// implemented: prints the file to edit by hand instead of writing it)
    Set { key: String, value: String },
    /// Reset to a default testme.json5
    Reset,
}

#[derive(Debug, Clone, Args, Default)]
pub struct RunArgs {
    /// Directory roots to search (repeatable); defaults to the current directory
    #[arg(long = "root")]
    pub root: Vec<PathBuf>,

    /// Minimum depth required to run a test (compared against its config's `depth`)
    #[arg(long, default_value_t = 0)]
    pub depth: u32,

    /// Repeat each test this many times
    #[arg(long, default_value_t = 1)]
    pub iterations: u32,

    /// Override `execution.workers` (must be at least 1)
    #[arg(long, value_parser = clap::value_parser!(usize).range(1..))]
    pub workers: Option<usize>,

    /// Override `execution.timeout`, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,

    /// Keep artifact directories even for passing tests
    #[arg(long)]
    pub keep: bool,

    /// Override the active profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Change to this directory before doing anything else
    #[arg(long)]
    pub chdir: Option<PathBuf>,

    #[arg(long, default_value = "text")]
    pub log_format: String,
}

impl RunArgs {
    pub fn log_format(&self) -> LogFormat {
        match self.log_format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn to_run_options(&self, patterns: Vec<String>) -> RunOptions {
        let roots = if self.root.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.root.clone()
        };

        RunOptions {
            roots,
            name_patterns: patterns,
            depth: self.depth,
            iterations: self.iterations.max(1),
            workers: self.workers,
            timeout_ms: self.timeout,
            verbose: self.verbose,
            quiet: self.quiet,
            keep: self.keep,
            profile: self.profile.clone(),
        }
    }
}

/// Default `testme.json5` contents written by `testme init`.
pub fn default_config_template() -> &'static str {
    r#"{
  // testme configuration - see documentation for all fields.
  enable: true,
  execution: {
    timeout: 30000,
    workers: 4,
  },
  patterns: {
    include: [],
    exclude: [],
  },
}
"#
}

/// Scaffold source for a new test of the given language tag.
pub fn scaffold_for_ext(name: &str, ext: &str) -> String {
    match ext {
        "c" => format!(
            "#include <stdio.h>\n\nint main(void) {{\n    printf(\"✓ {name}\\n\");\n    return 0;\n}}\n"
        ),
        "sh" => format!("#!/bin/sh\necho '✓ {name}'\nexit 0\n"),
        "py" => format!("print('✓ {name}')\n"),
        "js" | "ts" => format!("console.log('✓ {name}');\n"),
        "go" => format!(
            "package main\n\nimport \"fmt\"\n\nfunc main() {{\n    fmt.Println(\"✓ {name}\")\n}}\n"
        ),
        _ => format!("# {name}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_text() {
        let args = RunArgs::default();
        assert!(matches!(args.log_format(), LogFormat::Text));
    }

    #[test]
    fn to_run_options_defaults_root_to_current_dir() {
        let args = RunArgs::default();
        let options = args.to_run_options(vec![]);
        assert_eq!(options.roots, vec![PathBuf::from(".")]);
    }

    #[test]
    fn scaffold_includes_test_name() {
        let src = scaffold_for_ext("mytest", "c");
        assert!(src.contains("mytest"));
    }
}
