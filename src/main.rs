use chatpane::app::App;
use chatpane::cli::Args;
use chatpane::view::TerminalView;
use clap::{CommandFactory, Parser};
use colored::*;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatpane=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> chatpane::Result<()> {
    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "chatpane", &mut std::io::stdout());
        return Ok(());
    }

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = args.resolve_config()?;
    let mut app = App::new(config, TerminalView::stdout(!args.no_color))?;

    if let Some(theme) = args.theme {
        app.set_theme(theme)?;
    }
    match &args.model {
        Some(model) => app.choose_model(model)?,
        None if !args.clear => {
            app.sync_model().await?;
        }
        None => {}
    }

    if args.list_models {
        return app.print_models().await;
    }

    if args.clear {
        app.clear_history().await?;
        eprintln!("{}", "history cleared".bright_green());
    }
    if args.prompt.is_none() && args.is_one_shot_action() {
        return Ok(());
    }

    match &args.prompt {
        Some(prompt) => {
            if args.history {
                app.show_history().await;
            }
            app.send_prompt(prompt, args.document.clone()).await?;
        }
        None => {
            eprintln!(
                "{} {} {}",
                "chatpane".bright_cyan().bold(),
                "model:".bright_yellow(),
                app.current_model()
            );
            app.show_history().await;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            app.run_interactive(stdin).await?;
        }
    }

    if let Some(path) = &args.export {
        app.export(path)?;
        eprintln!("{} {}", "exported to".bright_green(), path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
