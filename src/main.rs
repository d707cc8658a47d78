use anyhow::{Context, Result};
use clap::Parser;
use hbget::{Config, LoadMode, Repository};
use indexmap::IndexMap;
use std::path::PathBuf;

mod commands;

/// hbget - Interact with libget repositories and manage package installs.
///
/// Runs bundle -> install -> uninstall -> screenshot -> icon processing when
/// multiple are specified.
#[derive(Parser)]
#[command(name = "hbget")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// URL of the libget repository
    repository: Option<String>,

    /// Path to the SD card root or target directory (defaults to the current
    /// working directory)
    install_path: Option<PathBuf>,

    /// Path to a bundle file: plaintext, one package name per line, comments
    /// start with #. Installs / updates all packages in the bundle.
    #[arg(short, long)]
    bundle: Option<PathBuf>,

    /// Package names to install / update, separated by spaces
    #[arg(short, long, num_args = 1..)]
    install: Vec<String>,

    /// Package names to uninstall, separated by spaces
    #[arg(short, long, num_args = 1..)]
    uninstall: Vec<String>,

    /// Download screenshots for these packages into the cache; prints a map
    /// of the downloaded files on completion
    #[arg(long, alias = "sc", num_args = 1..)]
    screenshot: Vec<String>,

    /// Download icons for these packages into the cache; prints a map of the
    /// downloaded files on completion
    #[arg(long, alias = "ic", num_args = 1..)]
    icon: Vec<String>,

    /// List installed packages at the install path
    #[arg(short, long)]
    list: bool,

    /// Recreate the package index, discarding installed-package records.
    /// The recovery path for a corrupt index.
    #[arg(long)]
    reinit: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("hbget={level}"))
        .with_target(false)
        .with_level(true)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        if let Some(hbget::Error::StateCorruption(_)) = e.downcast_ref::<hbget::Error>() {
            eprintln!();
            eprintln!(
                "The package index under .get/ is corrupt. Installs and uninstalls are\n\
                 blocked until it is recreated, which discards all installed-package\n\
                 records. Re-run with --reinit to rebuild it."
            );
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load().unwrap_or_default();

    let repo_url = cli
        .repository
        .clone()
        .or_else(|| config.repository.default_url.clone())
        .context("no repository URL given and no default_url configured in ~/.hbget/config.toml")?;

    let cache_dir = config.cache_dir()?.join(repo_cache_key(&repo_url));
    let repo = Repository::new("CLI", &repo_url, LoadMode::Eager, &cache_dir)
        .with_context(|| format!("failed to load repository {}", repo_url))?;

    let install_path = match cli.install_path.clone() {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    repo.set_install_path(&install_path)?;

    if cli.reinit {
        repo.reinit_get()?;
        println!("Recreated package index at {}", install_path.display());
    }

    let mut installed = Vec::new();
    let mut failed = Vec::new();
    let mut uninstalled = Vec::new();
    let mut uninstall_failed = Vec::new();
    let mut screenshots: IndexMap<String, String> = IndexMap::new();
    let mut icons: IndexMap<String, String> = IndexMap::new();

    if let Some(bundle_path) = &cli.bundle {
        let names = hbget::parse_bundle(bundle_path)
            .with_context(|| format!("failed to read bundle {}", bundle_path.display()))?;
        let outcome = commands::install::run(&repo, &names)?;
        installed.extend(outcome.succeeded);
        failed.extend(outcome.failed);
    }

    if !cli.install.is_empty() {
        let outcome = commands::install::run(&repo, &cli.install)?;
        installed.extend(outcome.succeeded);
        failed.extend(outcome.failed);
    }

    if !cli.uninstall.is_empty() {
        let outcome = commands::uninstall::run(&repo, &cli.uninstall)?;
        uninstalled.extend(outcome.succeeded);
        uninstall_failed.extend(outcome.failed);
    }

    if !cli.screenshot.is_empty() {
        screenshots = commands::assets::screenshots(&repo, &cli.screenshot)?;
    }

    if !cli.icon.is_empty() {
        icons = commands::assets::icons(&repo, &cli.icon)?;
    }

    if cli.list {
        commands::list::run(&repo)?;
    }

    println!("Finished processing.");
    print_names("Installed", &installed);
    print_names("Failed to install", &failed);
    print_names("Uninstalled", &uninstalled);
    print_names("Failed to uninstall", &uninstall_failed);
    if !screenshots.is_empty() {
        println!("\nScreenshots:");
        println!("{}", serde_json::to_string_pretty(&screenshots)?);
    }
    if !icons.is_empty() {
        println!("\nIcons:");
        println!("{}", serde_json::to_string_pretty(&icons)?);
    }

    Ok(())
}

fn print_names(heading: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("\n{}:", heading);
    for name in names {
        println!("\t- {}", name);
    }
}

/// Per-repository cache subdirectory, keyed by host so two repositories
/// never share cache slots.
fn repo_cache_key(repo_url: &str) -> String {
    url::Url::parse(repo_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "default".to_string())
}
