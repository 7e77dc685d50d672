//! Application context: built once at startup, handed to every handler.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use colored::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::client::{ChatClient, StreamSink, Submission};
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::prefs::{resolve_model, Preferences, PrefsStore, Theme};
use crate::reconciler::{Conversation, Reconciler};
use crate::view::{export_html, TerminalView};

/// Feeds streamed buffers through the reconciler and onto the terminal.
struct Projection<'a, W: Write> {
    reconciler: &'a mut Reconciler,
    view: &'a mut TerminalView<W>,
}

impl<W: Write> StreamSink for Projection<'_, W> {
    fn on_buffer(&mut self, text: &str) -> Result<()> {
        let report = self.reconciler.reconcile(text);
        self.view
            .apply(self.reconciler.conversation(), &report)
            .map_err(|e| ChatError::io("stdout", e))
    }

    fn on_complete(&mut self) -> Result<()> {
        self.view.finish().map_err(|e| ChatError::io("stdout", e))
    }
}

pub struct App<W: Write = io::Stdout> {
    config: ClientConfig,
    client: ChatClient,
    reconciler: Reconciler,
    view: TerminalView<W>,
    prefs_store: PrefsStore,
    prefs: Preferences,
}

impl<W: Write> App<W> {
    pub fn new(config: ClientConfig, view: TerminalView<W>) -> Result<Self> {
        config.validate()?;
        let client = ChatClient::new(&config)?;
        let reconciler = Reconciler::with_markdown(config.max_markdown_bytes);
        let prefs_store = PrefsStore::open(config.prefs_path.clone());
        let prefs = prefs_store.load();
        Ok(Self {
            config,
            client,
            reconciler,
            view,
            prefs_store,
            prefs,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        self.reconciler.conversation()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn into_view(self) -> TerminalView<W> {
        self.view
    }

    /// The model the next prompt is sent with.
    pub fn current_model(&self) -> String {
        self.prefs
            .selected_model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone())
    }

    pub async fn load_history(&mut self) -> Result<()> {
        let mut sink = Projection {
            reconciler: &mut self.reconciler,
            view: &mut self.view,
        };
        self.client.fetch_history(&mut sink).await
    }

    /// Like [`App::load_history`], but a failure is reported on stderr and
    /// the session carries on with whatever was received. Returns whether
    /// the history loaded.
    pub async fn show_history(&mut self) -> bool {
        match self.load_history().await {
            Ok(()) => true,
            Err(e) => {
                // close any message left open by a stream that broke midway
                let _ = self.view.finish();
                report(&e);
                false
            }
        }
    }

    pub async fn send_prompt(&mut self, prompt: &str, document: Option<PathBuf>) -> Result<()> {
        let mut submission = Submission::new(prompt, self.current_model());
        if let Some(path) = document {
            submission = submission.with_document(path);
        }
        let mut sink = Projection {
            reconciler: &mut self.reconciler,
            view: &mut self.view,
        };
        self.client.submit(&submission, &mut sink).await
    }

    /// Clears the local conversation only once the server has confirmed.
    pub async fn clear_history(&mut self) -> Result<()> {
        self.client.clear_history().await?;
        self.reconciler.clear();
        self.view.reset();
        Ok(())
    }

    pub async fn models(&self) -> Result<Vec<String>> {
        self.client.list_models().await
    }

    /// Reconcile the saved model with what the server offers and persist the
    /// result. If the list cannot be fetched the current choice stands.
    pub async fn sync_model(&mut self) -> Result<String> {
        let available = match self.models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "could not fetch model list");
                return Ok(self.current_model());
            }
        };
        let chosen = resolve_model(
            &available,
            self.prefs.selected_model.as_deref(),
            &self.config.default_model,
        );
        if self.prefs.selected_model.as_deref() != Some(chosen.as_str()) && !available.is_empty() {
            self.choose_model(&chosen)?;
        }
        Ok(chosen)
    }

    pub fn choose_model(&mut self, model: &str) -> Result<()> {
        self.prefs.selected_model = Some(model.to_string());
        self.prefs_store.save(&self.prefs)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.prefs.theme = theme;
        self.prefs_store.save(&self.prefs)
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        let page = export_html(self.conversation(), self.prefs.theme);
        std::fs::write(path, page).map_err(|e| ChatError::io(path.display().to_string(), e))
    }

    /// Read prompts line by line until EOF or `/quit`. A failed request is
    /// reported and the loop carries on; nothing is retried.
    pub async fn run_interactive<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            eprint!("{} ", ">".bright_blue().bold());
            let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| ChatError::io("stdin", e))?
            else {
                break;
            };
            let outcome = match parse_input(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Prompt(prompt) => self.send_prompt(&prompt, None).await,
                Input::Attach { path, prompt } => self.send_prompt(&prompt, Some(path)).await,
                Input::Clear => self.clear_history().await.map(|_| {
                    eprintln!("{}", "history cleared".bright_green());
                }),
                Input::Models => self.print_models().await,
                Input::UseModel(name) => self.choose_model(&name).map(|_| {
                    eprintln!("{} {}", "model:".bright_yellow(), name);
                }),
                Input::Export(path) => self.export(&path).map(|_| {
                    eprintln!("{} {}", "exported to".bright_green(), path.display());
                }),
                Input::Unknown(cmd) => {
                    eprintln!("{} {}", "unknown command:".bright_red(), cmd);
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                report(&e);
            }
        }
        Ok(())
    }

    pub async fn print_models(&self) -> Result<()> {
        let current = self.current_model();
        for model in self.models().await? {
            if model == current {
                eprintln!("* {}", model.bright_green());
            } else {
                eprintln!("  {}", model);
            }
        }
        Ok(())
    }
}

fn report(e: &ChatError) {
    warn!(error = %e, "request failed");
    eprintln!("{} {}", "error:".bright_red().bold(), e);
}

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Clear,
    Models,
    UseModel(String),
    Export(PathBuf),
    Attach { path: PathBuf, prompt: String },
    Prompt(String),
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Prompt(trimmed.to_string());
    };
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match (name, rest) {
        ("quit" | "exit", _) => Input::Quit,
        ("clear", _) => Input::Clear,
        ("models", _) => Input::Models,
        ("model", name) if !name.is_empty() => Input::UseModel(name.to_string()),
        ("export", path) if !path.is_empty() => Input::Export(PathBuf::from(path)),
        ("attach", rest) if !rest.is_empty() => {
            let (path, prompt) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Input::Attach {
                path: PathBuf::from(path),
                prompt: prompt.trim().to_string(),
            }
        }
        _ => Input::Unknown(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", Input::Empty)]
    #[case("   ", Input::Empty)]
    #[case("hello there", Input::Prompt("hello there".to_string()))]
    #[case("  /quit ", Input::Quit)]
    #[case("/exit", Input::Quit)]
    #[case("/clear", Input::Clear)]
    #[case("/models", Input::Models)]
    #[case("/model llama3:8b", Input::UseModel("llama3:8b".to_string()))]
    #[case("/model", Input::Unknown("/model".to_string()))]
    #[case("/export out.html", Input::Export(PathBuf::from("out.html")))]
    #[case("/frobnicate", Input::Unknown("/frobnicate".to_string()))]
    fn test_parse_input(#[case] line: &str, #[case] expected: Input) {
        assert_eq!(parse_input(line), expected);
    }

    #[test]
    fn test_parse_attach() {
        assert_eq!(
            parse_input("/attach report.pdf summarise this"),
            Input::Attach {
                path: PathBuf::from("report.pdf"),
                prompt: "summarise this".to_string(),
            }
        );
    }

    #[test]
    fn test_current_model_prefers_saved() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            prefs_path: dir.path().join("prefs.toml"),
            ..ClientConfig::default()
        };
        let mut app = App::new(config, TerminalView::new(Vec::new(), false)).unwrap();
        assert_eq!(app.current_model(), crate::config::DEFAULT_MODEL);
        app.choose_model("llama3").unwrap();
        assert_eq!(app.current_model(), "llama3");
        assert_eq!(app.preferences().selected_model.as_deref(), Some("llama3"));
    }

    #[test]
    fn test_export_writes_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            prefs_path: dir.path().join("prefs.toml"),
            ..ClientConfig::default()
        };
        let mut app = App::new(config, TerminalView::new(Vec::new(), false)).unwrap();
        app.set_theme(Theme::Dark).unwrap();
        let out = dir.path().join("chat.html");
        app.export(&out).unwrap();
        let page = std::fs::read_to_string(out).unwrap();
        assert!(page.contains("dark-theme"));
    }
}
