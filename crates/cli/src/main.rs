mod logging;
mod progress;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mediasort_core::{
    app_paths, apply_organize, collect_media, count_media_by_folder, load_config,
    load_config_from, merge_trees, plan_organize, save_config, save_config_to, AppConfig,
    CollectReport, FolderMediaCount, MergeOptions, MergeReport, OrganizePlan, OrganizeReport,
};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "mediasort-cli")]
#[command(
    about = "Sorts photos and videos into year/month folders and merges backup trees by content"
)]
struct Cli {
    /// Load settings from this file instead of the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Copy media into <source>/sorted/YYYY/YYYY_MM by capture date.
    Organize(OrganizeArgs),
    /// Copy the primary tree plus unique secondary content into a merged tree.
    Merge(MergeArgs),
    /// Copy media from every subfolder into one flat folder under the root.
    Collect(CollectArgs),
    /// Count photos per folder.
    Census(CensusArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct OrganizeArgs {
    source: PathBuf,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct MergeArgs {
    primary: PathBuf,
    secondary: PathBuf,
    #[arg(long)]
    destination: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CollectArgs {
    root: PathBuf,
}

#[derive(Debug, Args)]
struct CensusArgs {
    root: PathBuf,
    #[arg(long)]
    threshold: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Write the default settings file.
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match cli.command {
        Commands::Organize(args) => cmd_organize(args, cli.config.as_deref()),
        Commands::Merge(args) => cmd_merge(args, cli.config.as_deref()),
        Commands::Collect(args) => cmd_collect(args, cli.config.as_deref()),
        Commands::Census(args) => cmd_census(args, cli.config.as_deref()),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
            ConfigAction::Init { force } => cmd_config_init(cli.config.as_deref(), force),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    debug!(?config, "settings loaded");
    Ok(config)
}

fn cmd_organize(args: OrganizeArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let plan = plan_organize(&args.source, &config)?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => print_plan_table(&plan),
    }

    if !args.apply {
        eprintln!(
            "Dry run: nothing was copied. Pass --apply to copy into {}",
            plan.output_root.display()
        );
        return Ok(());
    }

    let bar = progress::stage_bar();
    let report = apply_organize(&plan, &config, &progress::reporter(bar.clone()))?;
    bar.finish_and_clear();
    print_organize_summary(&report);
    Ok(())
}

fn cmd_merge(args: MergeArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let options = MergeOptions {
        primary: args.primary,
        secondary: args.secondary,
        destination: args.destination,
    };

    let bar = progress::stage_bar();
    let report = merge_trees(&options, &config, &progress::reporter(bar.clone()));
    bar.finish_and_clear();
    print_merge_summary(&report?);
    Ok(())
}

fn cmd_collect(args: CollectArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let bar = progress::stage_bar();
    let report = collect_media(&args.root, &config, &progress::reporter(bar.clone()));
    bar.finish_and_clear();
    print_collect_summary(&report?);
    Ok(())
}

fn cmd_census(args: CensusArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let threshold = args.threshold.unwrap_or(config.census_threshold);
    let folders = count_media_by_folder(&args.root, &config.census_extensions, threshold)?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&folders)?),
        OutputFormat::Table => print_census_table(&folders),
    }
    eprintln!(
        "{} folders hold more than {} photos",
        folders.len(),
        threshold
    );
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let shown = match config_path {
        Some(path) => path.to_path_buf(),
        None => app_paths()?.config_path,
    };
    println!("Config file: {}", shown.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let target = match config_path {
        Some(path) => path.to_path_buf(),
        None => app_paths()?.config_path,
    };
    if target.exists() && !force {
        anyhow::bail!(
            "config file already exists: {} (use --force to overwrite)",
            target.display()
        );
    }

    let defaults = AppConfig::default();
    let written = match config_path {
        Some(path) => {
            save_config_to(&defaults, path)?;
            path.to_path_buf()
        }
        None => save_config(&defaults)?,
    };
    println!("Wrote {}", written.display());
    Ok(())
}

fn print_plan_table(plan: &OrganizePlan) {
    println!("source -> destination (date, from)");
    for assignment in &plan.assignments {
        println!(
            "{} -> {} ({}, {:?})",
            assignment.source.display(),
            assignment.destination.display(),
            assignment.date.when,
            assignment.date.source
        );
    }

    println!(
        "\nscanned={} media={} non_media_skip={} unreadable={}",
        plan.stats.scanned_files,
        plan.stats.media_files,
        plan.stats.skipped_non_media,
        plan.stats.unreadable
    );
}

fn print_organize_summary(report: &OrganizeReport) {
    eprintln!(
        "Organized into {}: scanned={} copied={} already_present={} errors={}",
        report.output_root.display(),
        report.scanned,
        report.copied,
        report.already_present,
        report.errors.len()
    );
    for failure in &report.errors {
        eprintln!("  failed: {} ({})", failure.path.display(), failure.reason);
    }
    if let Some(log) = &report.log_path {
        eprintln!("Run log: {}", log.display());
    }
}

fn print_merge_summary(report: &MergeReport) {
    eprintln!(
        "Merged into {}: primary={} (copied {}) secondary={} copied={} duplicates={} \
         errors={} unreadable={}",
        report.merged_root.display(),
        report.primary_files,
        report.primary_copied,
        report.secondary_files,
        report.copied.len(),
        report.duplicates.len(),
        report.errors.len(),
        report.unreadable
    );
    for failure in &report.errors {
        eprintln!("  failed: {} ({})", failure.path.display(), failure.reason);
    }
    if let Some(log) = &report.log_path {
        eprintln!("Run log: {}", log.display());
    }
}

fn print_collect_summary(report: &CollectReport) {
    eprintln!(
        "Collected into {}: scanned={} media={} copied={} already_present={} errors={}",
        report.collect_root.display(),
        report.scanned,
        report.media_files,
        report.copied,
        report.already_present,
        report.errors.len()
    );
    for failure in &report.errors {
        eprintln!("  failed: {} ({})", failure.path.display(), failure.reason);
    }
    if let Some(log) = &report.log_path {
        eprintln!("Run log: {}", log.display());
    }
}

fn print_census_table(folders: &[FolderMediaCount]) {
    println!("{:>7}  folder", "photos");
    for entry in folders {
        println!("{:>7}  {}", entry.media_count, entry.folder.display());
    }
}
