use anyhow::Result;
use clap::Parser;
use prompt_forge::app::{App, Event, Flow};
use prompt_forge::commands::parse_input;
use prompt_forge::config::{resolve_chat_credential, Config, MIN_MAX_TOKENS};
use prompt_forge::render::{Notice, TerminalRenderer};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "prompt-forge")]
#[command(about = "Refine topics into image prompts and render them")]
struct CliArgs {
    /// Chat model id to start with.
    #[arg(long)]
    model: Option<String>,

    /// Initial max tokens for chat replies.
    #[arg(long, value_parser = parse_max_tokens_arg)]
    max_tokens: Option<u32>,

    /// Directory that /save writes into.
    #[arg(long, value_name = "DIR")]
    download_dir: Option<PathBuf>,

    /// Chat API key; takes precedence over CEREBRAS_API_KEY.
    #[arg(long, env = "CEREBRAS_API_KEY", hide_env_values = true)]
    cerebras_api_key: Option<String>,
}

fn parse_max_tokens_arg(input: &str) -> std::result::Result<u32, String> {
    let value: u32 = input
        .parse()
        .map_err(|_| format!("Invalid token count '{}'. Expected a whole number", input))?;
    if value < MIN_MAX_TOKENS {
        return Err(format!("Max tokens must be at least {}", MIN_MAX_TOKENS));
    }
    Ok(value)
}

/// Chat key from the command line or environment, before asking interactively.
fn configured_chat_key(args: &CliArgs, config: &Config) -> Option<String> {
    args.cerebras_api_key
        .clone()
        .or_else(|| config.chat_api_key.clone())
}

fn ask_for_chat_key() -> prompt_forge::Result<Option<String>> {
    let mut editor = DefaultEditor::new()?;
    match editor.readline("Enter your Cerebras API key: ") {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn run_repl(mut app: App, mut editor: DefaultEditor) -> Result<()> {
    app.greet();

    loop {
        let line = match tokio::task::block_in_place(|| editor.readline("forge> ")) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                app.notify(Notice::info("Type /exit to leave."));
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        let event = match parse_input(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                app.notify(Notice::warning(e.to_string()));
                continue;
            }
        };

        if app.dispatch(event).await == Flow::Exit {
            break;
        }
    }

    info!("Session ended");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prompt_forge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let args = CliArgs::parse();
    if let Some(dir) = &args.download_dir {
        config.download_dir = dir.clone();
    }

    info!("Starting prompt-forge");

    let chat_key = match resolve_chat_credential(configured_chat_key(&args, &config), ask_for_chat_key) {
        Ok(key) => key,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let renderer = Box::new(TerminalRenderer::new());
    let mut app = match App::from_config(&config, chat_key, renderer, args.model.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(max_tokens) = args.max_tokens {
        app.dispatch(Event::SetMaxTokens(max_tokens)).await;
    }

    // Ctrl-C while a reply streams cancels that reply, not the process.
    let interrupter = app.interrupter();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupter.interrupt();
        }
    });

    let editor = DefaultEditor::new()?;
    let span = info_span!("session", id = %app.session().id);
    if let Err(e) = run_repl(app, editor).instrument(span).await {
        error!("Session failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
