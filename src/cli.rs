use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::shell::Shell;

/// Render shell prompt segments
#[derive(Parser)]
#[command(name = "promptline", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file [default: $PROMPTLINE_CONFIG, else <config dir>/promptline/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log detection steps and external commands to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Render the prompt for the current directory
    Print {
        /// Shell the prompt is rendered for
        #[arg(long, default_value = "bash")]
        shell: Shell,
    },

    /// Start a prompt session for a shell
    #[command(after_long_help = r#"Prints a statement that sets PROMPTLINE_SESSION_ID to a fresh id. Evaluate it once per interactive shell:

```console
eval "$(promptline init bash)"
```

Cached values are shared by all prompts in that shell session."#)]
    Init {
        shell: Shell,

        /// Also print the resolved config path and cache scope as comments
        #[arg(short, long)]
        print: bool,
    },

    /// Inspect or clear the render cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Print the cache directory
    Path,
    /// Remove all cached values
    Clear,
}
