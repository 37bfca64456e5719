//! Arbor - tree-view file and git explorer for the terminal

mod app;
mod keys;
mod picker;

use app::App;
use arbor_core::{EventBus, MemoryBuffer, Settings};
use arbor_view::{register_builtins, ColumnRegistrar, ViewEngine};
use clap::Parser;
use color_eyre::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tree-view file and git explorer for the terminal
#[derive(Parser)]
#[command(name = "arbor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Starting directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Show hidden files at startup
    #[arg(long)]
    hidden: bool,

    /// Child line template, overrides the config file
    #[arg(long)]
    template: Option<String>,

    /// Append tracing output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    // Resolve path to absolute
    let root = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));

    let bus = EventBus::default();
    let settings = Arc::new(Settings::load(bus.clone())?);
    if cli.hidden {
        settings.set("file.showHiddenFiles", toml::Value::Boolean(true));
    }
    if let Some(template) = &cli.template {
        settings.set("file.child.template", toml::Value::String(template.clone()));
    }
    let mut registrar = ColumnRegistrar::new();
    register_builtins(&mut registrar);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let engine = match ViewEngine::open(
        &root,
        settings,
        bus,
        Box::new(MemoryBuffer::new()),
        registrar,
    )
    .await
    {
        Ok(engine) => engine,
        Err(e) => {
            // Clean up terminal before printing error
            disable_raw_mode()?;
            execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
            terminal.show_cursor()?;
            return Err(color_eyre::eyre::eyre!(
                "Failed to open {}: {}",
                root.display(),
                e
            ));
        }
    };
    if let Err(e) = engine.refresh_git().await {
        warn!(error = %e, "initial git refresh failed");
    }

    let mut app = App::new(engine);

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B: Backend,
    <B as Backend>::Error: std::error::Error + Send + Sync + 'static,
{
    loop {
        terminal.draw(|frame| app.render(frame))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                keys::handle_key(app, key).await;
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

/// Sends tracing output to `log_file` when one is given
///
/// Without a log file no subscriber is installed; a TUI cannot share
/// stdout with its own frames.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = File::options().create(true).append(true).open(path)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .with(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .try_init()
        .map_err(|error| color_eyre::eyre::eyre!(error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["arbor"]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(!cli.hidden);
        assert!(cli.template.is_none());
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "arbor",
            "/tmp",
            "--hidden",
            "--template",
            "git filename",
            "--log-file",
            "/tmp/arbor.log",
        ]);
        assert_eq!(cli.path, PathBuf::from("/tmp"));
        assert!(cli.hidden);
        assert_eq!(cli.template.as_deref(), Some("git filename"));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/arbor.log")));
    }
}
