use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Instant};

use imgtk::{
    actions::{ACTIONS, Action, ActionContext, FilterKind, parse_actions},
    common::{build_worker_pool, errors::handle_error},
    config::AppConfig,
    item::Item,
    utils::Collector,
    workflow::{
        Pipeline,
        processors::{
            ocr::{Tesseract, check_tesseract},
            setup::initialize_logger,
        },
    },
};

/// Filter and transform images in bulk.
///
/// Actions are `[!]name[:value]` tokens applied in order, for example
/// `-a sz:100KB, -a rs:800| -a s:out`. Filters run first, cheapest first.
/// Use `--list-actions` to see every action.
#[derive(Parser, Debug)]
#[command(name = "imgtk", author, version, about)]
struct Args {
    /// Files, directories or glob patterns to process.
    #[arg(required_unless_present = "list_actions")]
    paths: Vec<PathBuf>,

    /// Action token, repeatable. Order matters for modifiers.
    #[arg(
        short,
        long = "action",
        value_name = "ACTION",
        required_unless_present = "list_actions"
    )]
    actions: Vec<String>,

    /// Only collect files with these extensions from directories and patterns.
    #[arg(short, long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Worker threads, defaults to one per core.
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Abort the whole run when a filter or modifier fails on one image.
    #[arg(long)]
    fail_fast: bool,

    /// Path to the tesseract binary used by the Text filter.
    #[arg(long, value_name = "BIN")]
    tesseract: Option<PathBuf>,

    /// Print the available actions and exit.
    #[arg(long)]
    list_actions: bool,

    /// Parse and validate the actions, collect inputs, but process nothing.
    #[arg(long)]
    dry_run: bool,

    /// Print the paths of surviving images to stdout.
    #[arg(long)]
    print: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn list_actions() {
    println!("{:<14} {:<6} {:<10} USAGE", "NAME", "ABBREV", "KIND");
    for spec in ACTIONS {
        println!(
            "{:<14} {:<6} {:<10} {}",
            spec.name,
            spec.abbrev,
            spec.kind().to_string(),
            spec.usage
        );
        println!("{:<32}{}", "", spec.description);
    }
}

fn uses_text_filter(actions: &[Action]) -> bool {
    actions
        .iter()
        .any(|a| matches!(a, Action::Filter(f) if matches!(f.kind, FilterKind::Text(_))))
}

fn run(args: Args) -> Result<()> {
    let config = AppConfig::from_env()?;

    let actions = parse_actions(&args.actions)?;
    let tesseract = Tesseract::new(
        args.tesseract
            .or(config.tesseract)
            .unwrap_or_else(|| PathBuf::from("tesseract")),
    );
    if uses_text_filter(&actions) {
        check_tesseract(&tesseract).context("text filters need tesseract")?;
    }

    let ctx = ActionContext::new(Arc::new(tesseract));
    let pipeline = Pipeline::new(actions, ctx)
        .fail_fast(args.fail_fast || config.fail_fast)
        .unload_survivors(true)
        .progress(true);
    pipeline.validate()?;

    let extensions = if args.extensions.is_empty() {
        config.extensions
    } else {
        args.extensions
    };
    let paths = Collector::default()
        .extensions(&extensions)
        .collect(&args.paths)
        .context("failed to collect input paths")?;
    info!("Collected {} files", paths.len());

    if args.dry_run {
        info!(
            "Dry run: {} filters, {} modifiers, nothing processed",
            pipeline.filters().len(),
            pipeline.modifiers().len()
        );
        return Ok(());
    }

    let items: Vec<Item> = paths
        .into_iter()
        .filter_map(|path| match Item::new(path) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!("Skipping input: {}", err);
                None
            }
        })
        .collect();

    let pool = build_worker_pool(args.threads.or(config.threads))?;
    let report = pipeline.run(items, &pool)?;

    if args.print {
        for item in &report.survivors {
            println!("{}", item.path().display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.list_actions {
        list_actions();
        return ExitCode::SUCCESS;
    }

    initialize_logger(args.verbose);
    let start_time = Instant::now();
    match run(args) {
        Ok(()) => {
            info!(duration = &*format!("{:?}", start_time.elapsed()); "Done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", handle_error(err));
            ExitCode::FAILURE
        }
    }
}
