use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::prefs::Theme;

#[derive(Parser, Debug)]
#[command(name = "chatpane")]
#[command(version)]
#[command(about = "Terminal client for newline-delimited JSON chat backends")]
pub struct Args {
    /// Prompt to send. Without one, an interactive session starts.
    pub prompt: Option<String>,

    /// Base URL of the chat backend (overrides the config file)
    #[arg(long, short)]
    pub server: Option<String>,

    /// Model to use; remembered for later sessions
    #[arg(long, short)]
    pub model: Option<String>,

    /// File to attach to the prompt
    #[arg(long, short)]
    pub document: Option<PathBuf>,

    /// TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Show the stored history before sending the prompt
    #[arg(long)]
    pub history: bool,

    /// Clear the server-side history
    #[arg(long)]
    pub clear: bool,

    /// List the models offered by the backend and exit
    #[arg(long)]
    pub list_models: bool,

    /// Persist a page theme for HTML exports
    #[arg(long, value_enum)]
    pub theme: Option<Theme>,

    /// Write the conversation to an HTML file when done
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// True when the invocation does one thing and exits without a prompt.
    pub fn is_one_shot_action(&self) -> bool {
        self.list_models || self.clear || self.completions.is_some()
    }
}
