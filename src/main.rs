use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use testme::cli::{self, App, Commands, ConfigAction};
use testme::config::{self, schema::OutputFormatKind};
use testme::discovery::{self, DiscoveryFilter};
use testme::reporter::{DetailedReporter, JsonReporter, Reporter, SimpleReporter};
use testme::scheduler;

fn main() -> Result<()> {
    let app = App::parse();

    let run_args = match &app.command {
        Some(Commands::Run { args, .. }) => args.clone(),
        Some(Commands::List { args, .. }) => args.clone(),
        _ => app.run_args.clone(),
    };

    if let Some(chdir) = &run_args.chdir {
        std::env::set_current_dir(chdir)
            .with_context(|| format!("could not change directory to {}", chdir.display()))?;
    }

    testme::logging::init(run_args.verbose, run_args.quiet, run_args.log_format());

    let exit_code = match app.command {
        Some(Commands::Init) => run_init()?,
        Some(Commands::New { name, ext }) => run_new(&name, &ext)?,
        Some(Commands::Config { action }) => run_config(action)?,
        Some(Commands::List { patterns, args }) => run_list(&args, patterns)?,
        Some(Commands::Run { patterns, args }) => run_tests(&args, patterns)?,
        None => run_tests(&app.run_args, app.patterns)?,
    };

    std::process::exit(exit_code);
}

fn run_tests(run_args: &cli::RunArgs, patterns: Vec<String>) -> Result<i32> {
    let options = run_args.to_run_options(patterns);
    let (config, _) = config::load_for_dir(&std::env::current_dir()?, None)
        .unwrap_or_else(|_| (Default::default(), None));

    let mut reporter: Box<dyn Reporter> = match config.output.format {
        OutputFormatKind::Detailed => Box::new(DetailedReporter::new(config.output.colors)),
        OutputFormatKind::Json => Box::new(JsonReporter),
        OutputFormatKind::Simple => Box::new(SimpleReporter::new(config.output.colors)),
    };

    let cancel: scheduler::CancelFlag = Arc::new(AtomicBool::new(false));
    let handler_cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_cancel.store(true, Ordering::SeqCst)) {
        error!(error = %e, "failed to install Ctrl-C handler");
    }

    Ok(scheduler::run(&options, reporter.as_mut(), &cancel))
}

fn run_list(run_args: &cli::RunArgs, patterns: Vec<String>) -> Result<i32> {
    let options = run_args.to_run_options(patterns);
    let filter = DiscoveryFilter {
        name_patterns: options.name_patterns.clone(),
        depth: options.depth,
    };

    let mut config_cache = std::collections::HashMap::new();
    let files = discovery::discover(&options.roots, &filter, |dir| {
        let (config, _) = config_cache
            .entry(dir.to_path_buf())
            .or_insert_with(|| config::load_for_dir(dir, None).unwrap_or_else(|_| (Default::default(), None)))
            .clone();
        (config.enable, config.depth, config.patterns.clone())
    });

    for file in &files {
        println!("{}", file.path.display());
    }
    println!("{} test(s)", files.len());
    Ok(0)
}

fn run_init() -> Result<i32> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);
    if path.exists() {
        println!("{} already exists", path.display());
        return Ok(0);
    }
    std::fs::write(path, cli::default_config_template())
        .with_context(|| format!("could not write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(0)
}

fn run_new(name: &str, ext: &str) -> Result<i32> {
    let file_name = format!("{name}.tst.{ext}");
    let path = std::path::Path::new(&file_name);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::write(path, cli::scaffold_for_ext(name, ext))
        .with_context(|| format!("could not write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(0)
}

fn run_config(action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Show => {
            let (config, dir) = config::load_for_dir(&std::env::current_dir()?, None)?;
            println!("{config:#?}");
            if let Some(dir) = dir {
                println!("(resolved from {})", dir.display());
            }
            Ok(0)
        }
        ConfigAction::Set { key, value } => {
            println!(
                "note: directly editing {} for '{key} = {value}' is not yet automated; edit the file by hand",
                config::CONFIG_FILE_NAME
            );
            Ok(0)
        }
        ConfigAction::Reset => run_init(),
    }
}
