use std::fs::OpenOptions;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, theme::ColorfulTheme};
use env_logger::{Env, Target};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use sitechat::client::{ChatService, ChatServiceClient};
use sitechat::config::{API_URL_ENV, Config, Settings};
use sitechat::{Session, SubmitOutcome};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "sitechat", version)]
#[command(about = "Chat with the site visit data chatbot")]
struct Cli {
    /// Base URL of the chat API
    #[arg(long, global = true, env = API_URL_ENV)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// List previously asked questions
    History,
    /// Clear the server-side chat history
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or change stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location and effective settings
    Show,
    /// Persist the API base URL
    SetUrl { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.command.is_none()) {
        eprintln!("{} {}", "Logging disabled:".yellow(), err);
    }

    let config = Config::load().unwrap_or_else(|err| {
        log::warn!("Ignoring unreadable config: {}", err);
        Config::new()
    });
    let settings = Settings::resolve(cli.api_url.as_deref(), &config);

    match cli.command {
        None => run_tui(&settings).await,
        Some(Commands::Ask { question }) => ask(&settings, &question).await,
        Some(Commands::History) => show_history(&settings).await,
        Some(Commands::Clear { yes }) => clear_history(&settings, yes).await,
        Some(Commands::Config { action }) => run_config(action, &config, &settings),
    }
}

/// Logs go to stderr for subcommands. The TUI draws on stderr, so it logs to
/// a file instead (or not at all if the file can't be opened).
fn init_logging(tui_mode: bool) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));

    if tui_mode {
        let log_file = Config::get_log_path().and_then(|path| {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(OpenOptions::new().create(true).append(true).open(path)?)
        });
        match log_file {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    builder.try_init()
}

async fn run_tui(settings: &Settings) -> Result<()> {
    let client = ChatServiceClient::from_settings(settings)?;
    log::info!("Starting TUI against {}", client.base_url());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(client);
    let result = run_app(&mut terminal, &mut app).await;

    app.shutdown();
    tui::restore()?;
    result
}

async fn run_app(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));
    app.start();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }

        app.poll_tasks().await;
    }

    Ok(())
}

async fn ask(settings: &Settings, question: &str) -> Result<()> {
    let client = ChatServiceClient::from_settings(settings)?;
    let mut session = Session::new(client);

    let outcome = session.submit_message(question).await;
    if outcome == SubmitOutcome::Ignored {
        bail!("Nothing to send: the question is empty");
    }

    let state = session.store().state();
    for message in &state.messages {
        if message.is_user {
            println!("{}", "You:".bold().cyan());
        } else {
            println!("{}", "Bot:".bold().yellow());
        }
        println!("{}\n", message.content);
    }

    if outcome == SubmitOutcome::Failed {
        println!("Make sure the chat API is reachable at {}", settings.api_url.bold());
        return Err(anyhow!("Request to {} failed", settings.api_url));
    }
    Ok(())
}

async fn show_history(settings: &Settings) -> Result<()> {
    let client = ChatServiceClient::from_settings(settings)?;
    let response = client.fetch_history().await?;

    println!("\n{}", "Chat History".bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    if response.history.is_empty() {
        println!("{}", "No chat history yet".dimmed());
    }
    for record in response.history {
        println!("  • {}", record.question);
    }

    Ok(())
}

async fn clear_history(settings: &Settings, yes: bool) -> Result<()> {
    let confirmed = yes
        || Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Are you sure you want to clear chat history?")
            .default(false)
            .interact()?;

    if !confirmed {
        println!("{}", "Nothing cleared".dimmed());
        return Ok(());
    }

    let client = ChatServiceClient::from_settings(settings)?;
    let mut session = Session::new(client);
    session.clear_all().await.map_err(|notice| anyhow!(notice))?;

    println!("{}", "Chat history cleared".green());
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, settings: &Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{} {}", "Config file:".bold(), Config::get_config_path()?.display());
            println!(
                "{} {}",
                "Stored api_url:".bold(),
                config.api_url.as_deref().unwrap_or("(not set)")
            );
            println!("{} {}", "Effective api_url:".bold(), settings.api_url.green());
            println!("{} {}s", "Timeout:".bold(), settings.timeout.as_secs());
        }
        ConfigAction::SetUrl { url } => {
            Config::save_api_url(&url)?;
            println!("Saved api_url = {}", url.green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["sitechat"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_api_url_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["sitechat", "history", "--api-url", "http://h:1/api"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://h:1/api"));
        assert!(matches!(cli.command, Some(Commands::History)));
    }

    #[test]
    fn test_clear_yes_flag() {
        let cli = Cli::try_parse_from(["sitechat", "clear", "-y"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Clear { yes: true })));
    }

    #[test]
    fn test_logger_init_failure_is_reported() {
        // One global logger per process: the first call may already have lost
        // to another test, the second always loses
        let _first = init_logging(false);
        assert!(init_logging(false).is_err());
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["sitechat", "ask"]).is_err());
    }
}
