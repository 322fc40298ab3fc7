use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use promptline::cache::{self, Cache, FileCache, MemoryCache};
use promptline::cli::{CacheCommand, Cli, Command};
use promptline::config::{self, LoadedConfig};
use promptline::engine;
use promptline::env::{Environment, Terminal};
use promptline::shell::{self, Shell, ShellInit};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("promptline: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder
        .format_timestamp_micros()
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = config::config_path(cli.config.as_deref());

    match cli.command {
        Command::Print { shell } => print_prompt(config_path.as_deref(), shell),
        Command::Init { shell, print } => init_shell(config_path.as_deref(), shell, print),
        Command::Cache(CacheCommand::Path) => {
            let dir = cache::default_cache_dir().context("No cache directory available")?;
            println!("{}", dir.display());
            Ok(())
        }
        Command::Cache(CacheCommand::Clear) => {
            let dir = cache::default_cache_dir().context("No cache directory available")?;
            let removed = cache::clear_all(&dir);
            println!("Removed {removed} cache file(s) from {}", dir.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let display = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<none>".to_string());
    config::load(path).with_context(|| format!("Failed to load configuration from {display}"))
}

fn scope_for(loaded: &LoadedConfig, shell: Shell, session_id: &str) -> String {
    cache::cache_scope(
        &loaded.hash,
        &loaded.features_hash(&shell.to_string()),
        session_id,
    )
}

fn open_cache(scope: &str) -> Box<dyn Cache> {
    match cache::default_cache_dir() {
        Some(dir) => Box::new(FileCache::open(&dir, scope)),
        None => {
            log::debug!("No cache directory, caching in memory only");
            Box::new(MemoryCache::new())
        }
    }
}

fn print_prompt(config_path: Option<&Path>, shell: Shell) -> anyhow::Result<()> {
    let loaded = load_config(config_path)?;
    let scope = scope_for(&loaded, shell, &shell::current_session_id());
    log::debug!("Rendering {} segment(s), cache scope {}", loaded.config.segments.len(), scope);

    let pwd = std::env::current_dir().context("Failed to determine working directory")?;
    let env = Arc::new(Terminal::new(
        pwd,
        loaded.config.command_timeout(),
        open_cache(&scope),
    ));

    // Segment panics are contained by the engine; keep their messages out of
    // the terminal unless debugging
    std::panic::set_hook(Box::new(|info| log::debug!("{info}")));
    let prompt = engine::render(&loaded.config, env.clone());

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    // A cache that can't be written only costs speed on the next render
    if let Err(e) = env.cache().persist() {
        log::debug!("Failed to persist cache: {e:#}");
    }
    Ok(())
}

fn init_shell(config_path: Option<&Path>, shell: Shell, print: bool) -> anyhow::Result<()> {
    let init = ShellInit::new(shell);

    if print {
        let loaded = load_config(config_path)?;
        let config_display = loaded
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string());
        println!("# promptline config: {config_display}");
        println!("# promptline cache scope: {}", scope_for(&loaded, shell, &init.session_id));
    }

    println!("{}", init.generate());
    Ok(())
}
