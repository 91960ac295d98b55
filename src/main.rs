use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod assistant;
mod config;
mod gemini;
mod handler;
mod image;
mod state;
mod tui;
mod ui;

use app::App;
use assistant::{
    ChatAssistant, ComplexAssistant, ErrorPolicy, ImageAssistant, CHAT_APOLOGY, IMAGE_APOLOGY,
};
use config::Config;
use gemini::{GeminiClient, Transport};
use image::ImageAttachment;

#[derive(Parser)]
#[command(name = "fx2")]
#[command(about = "TUI and CLI assistant for the Sony FX2 camera, powered by Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the grounded chat expert a single question
    Ask {
        /// Your question
        question: String,
    },
    /// Analyze an image (menu screenshot, button photo, scene)
    Analyze {
        /// Path to a PNG, JPEG or WEBP image (max 4MB)
        image: PathBuf,
        /// Your question about the image
        question: String,
    },
    /// Ask a complex production question with extended reasoning
    Complex {
        /// Your question
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.command.is_none())?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        Config::default()
    });

    // The credential is resolved exactly once; a missing key refuses to
    // start rather than failing on the first request.
    let api_key = config.resolve_api_key()?;
    let transport: Arc<dyn Transport> = Arc::new(GeminiClient::new(api_key));

    match cli.command {
        None => run_tui(&config, transport).await,
        Some(Commands::Ask { question }) => ask_once(&config, transport, &question).await,
        Some(Commands::Analyze { image, question }) => {
            analyze_once(&config, transport, &image, &question).await
        }
        Some(Commands::Complex { question }) => complex_once(&config, transport, &question).await,
    }
}

/// Interactive runs log to a file so the terminal stays owned by the TUI;
/// one-shot runs log to stderr.
fn init_logging(interactive: bool) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fx2_cli=info"));

    if interactive {
        let log_dir = Config::config_path()?
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| anyhow!("could not determine log directory"))?;
        fs::create_dir_all(&log_dir)?;

        let appender = tracing_appender::rolling::never(&log_dir, "fx2.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(None)
    }
}

async fn run_tui(config: &Config, transport: Arc<dyn Transport>) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(config, transport);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event);
        }
        app.poll_responses().await;
    }

    tui::restore()?;
    Ok(())
}

async fn ask_once(config: &Config, transport: Arc<dyn Transport>, question: &str) -> Result<()> {
    println!("🤖 Consultando al experto en la FX2...\n");

    let assistant = ChatAssistant::new(
        transport,
        config.chat_model(),
        ErrorPolicy::Apologize(CHAT_APOLOGY),
    );
    let reply = assistant.ask(question).await?;

    println!("{}", "Respuesta:".bold().green());
    println!("{}", reply.text);

    if !reply.sources.is_empty() {
        println!("\n{}", "Fuentes:".bold().blue());
        for source in &reply.sources {
            println!("• {} - {}", source.title.yellow(), source.uri.dimmed());
        }
    }

    Ok(())
}

async fn analyze_once(
    config: &Config,
    transport: Arc<dyn Transport>,
    image: &PathBuf,
    question: &str,
) -> Result<()> {
    // Local gates run before any network interaction
    let attachment = match ImageAttachment::load(image) {
        Ok(attachment) => attachment,
        Err(e) => {
            println!("{}: {}", "Imagen rechazada".red(), e);
            return Ok(());
        }
    };

    println!(
        "🖼  Analizando {} ({})...\n",
        attachment.file_name.bold().magenta(),
        attachment.size_label().dimmed()
    );

    let assistant = ImageAssistant::new(
        transport,
        config.chat_model(),
        ErrorPolicy::Apologize(IMAGE_APOLOGY),
    );
    let answer = assistant.analyze(question, &attachment).await?;

    println!("{}", "Respuesta:".bold().green());
    println!("{}", answer);

    Ok(())
}

async fn complex_once(
    config: &Config,
    transport: Arc<dyn Transport>,
    question: &str,
) -> Result<()> {
    println!("🧠 {}\n", "Modo de Pensamiento Pro".bold().magenta());

    let assistant = ComplexAssistant::new(transport, config.pro_model(), ErrorPolicy::Propagate);
    match assistant.consult(question).await {
        Ok(answer) => {
            println!("{}", "Respuesta del Experto:".bold().green());
            println!("{}", answer);
        }
        Err(e) => {
            println!("{}", app::COMPLEX_ERROR.red());
            println!("{}", e.to_string().dimmed());
        }
    }

    Ok(())
}
