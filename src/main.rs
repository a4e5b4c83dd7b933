//! Image Autoresize CLI
//!
//! Checks rule configuration and applies it to uploaded files.

use anyhow::{Result, bail};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_autoresize::rules::{GroupId, split_list};
use image_autoresize::{
    Config, DesktopNotifier, ImageCrateBackend, Outcome, Processor, RuleEngine,
};

#[derive(Parser, Debug)]
#[command(name = "image-autoresize")]
#[command(author, version, about = "Automatically shrink oversized uploaded images")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate config file
    Check {
        /// Path to config file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List compiled rules in evaluation order
    List,

    /// Apply the rules to uploaded files (dry-run by default)
    Process {
        /// Uploaded files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Groups of the uploading user (repeatable, comma-separated)
        #[arg(short, long = "group", value_name = "GROUP")]
        groups: Vec<String>,

        /// Actually resize and replace files (not just dry-run)
        #[arg(long)]
        apply: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = Config::load(cli.config.as_deref());

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|c| c.general.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("AUTORESIZE_LOG").unwrap_or(log_level),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Check {
            config: config_path,
        } => {
            let loaded = match config_path {
                Some(path) => Config::load(Some(&path)),
                None => loaded,
            };
            match loaded.and_then(|config| Ok((config.compile()?, config))) {
                Ok((ruleset, config)) => {
                    if config.defaults.is_none() {
                        eprintln!("✗ Config error: no [defaults] table");
                        std::process::exit(1);
                    }
                    println!("✓ Config is valid");
                    println!("  site root: {}", config.site_root().display());
                    println!("  {} sheets", config.sheets.len());
                    println!(
                        "  {} rules ({} dropped)",
                        ruleset.rules().len(),
                        config.child_nodes().len() - ruleset.specific_rules().len()
                    );
                }
                Err(e) => {
                    eprintln!("✗ Config error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::List => {
            let config = Config::or_report(loaded, &DesktopNotifier::new(false));
            let ruleset = config.compile()?;
            println!("Rules:");
            for (i, rule) in ruleset.rules().iter().enumerate() {
                println!("  [{}] {}", i + 1, rule);
            }
        }
        Commands::Process {
            files,
            groups,
            apply,
        } => {
            let notifications_enabled = loaded
                .as_ref()
                .is_ok_and(|c| c.general.notifications_enabled);
            let notifier = DesktopNotifier::new(notifications_enabled);
            let config = Config::or_report(loaded, &notifier);

            let groups: BTreeSet<GroupId> = groups
                .iter()
                .flat_map(|g| split_list(Some(g.as_str())))
                .collect();
            let engine = RuleEngine::new(config.compile()?.into(), config.site_root());
            let backend = ImageCrateBackend::new();
            let processor = Processor::new(engine, &backend, &backend, &notifier);

            let mut failed = 0;
            for path in &files {
                if !apply {
                    match processor.plan(path, &groups) {
                        Some(planned) => println!(
                            "  [dry-run] {} -> '{}' max {}x{}",
                            path.display(),
                            planned.rule.name,
                            dimension(planned.plan.max_width),
                            dimension(planned.plan.max_height),
                        ),
                        None => println!("  [dry-run] {} -> no matching rule", path.display()),
                    }
                    continue;
                }

                match processor.process(path, &groups) {
                    Ok(Outcome::Resized { width, height, .. }) => {
                        println!("  Resized: {} -> {}x{}", path.display(), width, height)
                    }
                    Ok(Outcome::Unchanged { rule } | Outcome::Unconstrained { rule }) => {
                        println!("  Unchanged: {} ('{}')", path.display(), rule)
                    }
                    Ok(Outcome::NoMatch) => println!("  Skipped: {}", path.display()),
                    Err(e) => {
                        error!("{}: {:#}", path.display(), e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                bail!("{} of {} file(s) failed", failed, files.len());
            }
        }
    }

    Ok(())
}

fn dimension(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
