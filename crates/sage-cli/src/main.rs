//! sage - streaming terminal assistant

mod commands;
mod config;

use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use crossterm::style::Color;

use sage_ai::ChatClient;
use sage_core::{AssistantSession, BpeTokenCounter, SessionConfig, Theme};

/// sage - streaming terminal assistant
#[derive(Parser, Debug)]
#[command(name = "sage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gpt-4-0125-preview)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum tokens per response
    #[arg(long, alias = "mrt")]
    max_response_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Code span foreground color
    #[arg(short, long)]
    color: Option<String>,

    /// Code span background color
    #[arg(long, alias = "bc")]
    background_color: Option<String>,

    /// Show token usage after each turn
    #[arg(long, alias = "cc")]
    context_usage: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn parse_color(name: &str) -> Option<Color> {
    let color = match name.to_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "grey" | "gray" => Color::Grey,
        "darkred" => Color::DarkRed,
        "darkgreen" => Color::DarkGreen,
        "darkyellow" => Color::DarkYellow,
        "darkblue" => Color::DarkBlue,
        "darkmagenta" => Color::DarkMagenta,
        "darkcyan" => Color::DarkCyan,
        "darkgrey" | "darkgray" => Color::DarkGrey,
        _ => return None,
    };
    Some(color)
}

fn resolve_color(flag: Option<&str>, from_config: Option<&str>, default: Color) -> Color {
    let name = match flag.or(from_config) {
        Some(name) => name,
        None => return default,
    };
    match parse_color(name) {
        Some(color) => color,
        None => {
            eprintln!("Warning: Unknown color '{}', using default", name);
            default
        }
    }
}

/// Get the API key: env or config file first, interactive prompt last.
fn resolve_api_key(cfg: &config::Config) -> anyhow::Result<String> {
    if let Some(key) = cfg.get_api_key() {
        return Ok(key);
    }

    print!("Enter your OpenAI API key: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let key = input.trim().to_string();
    if key.is_empty() {
        anyhow::bail!("no API key provided");
    }
    Ok(key)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sage=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file; CLI args take precedence
    let cfg = config::Config::load();

    let model = args
        .model
        .or(cfg.model.clone())
        .unwrap_or_else(|| sage_ai::models::DEFAULT_MODEL.to_string());

    let temperature = args.temperature.or(cfg.temperature).unwrap_or(0.7);

    let max_response_tokens = args
        .max_response_tokens
        .or(cfg.max_response_tokens)
        .unwrap_or(1024);

    let theme = Theme {
        code_fg: resolve_color(args.color.as_deref(), cfg.color.as_deref(), Color::Green),
        code_bg: resolve_color(
            args.background_color.as_deref(),
            cfg.background_color.as_deref(),
            Color::Black,
        ),
    };

    let show_usage = args.context_usage || cfg.context_usage.unwrap_or(false);

    let api_key = match resolve_api_key(&cfg) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Set your API key with: export OPENAI_API_KEY=your-key");
            eprintln!("Or add it to the config file: sage --init-config");
            std::process::exit(1);
        }
    };

    let counter = Arc::new(
        BpeTokenCounter::for_model(&model)
            .map_err(|e| anyhow::anyhow!("failed to initialize tokenizer: {}", e))?,
    );
    let client = Arc::new(ChatClient::new(api_key));

    let session_config = SessionConfig {
        model,
        temperature,
        max_response_tokens,
        theme,
        show_usage,
    };
    let session = AssistantSession::new(session_config, client, counter);

    run_repl(session).await
}

async fn run_repl(mut session: AssistantSession) -> anyhow::Result<()> {
    println!("Coding Assistant ({}). Type '/q' to exit.", session.model());

    let mut stdout = io::stdout();
    loop {
        print!(">>> Prompt: ");
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input) {
            match result {
                commands::CommandResult::Clear => {
                    session.clear_history();
                    println!("Cleared conversation.");
                }
                commands::CommandResult::ShowHistory => {
                    let display = session.history_display();
                    if display.is_empty() {
                        println!("No conversation yet.");
                    } else {
                        print!("{}", display);
                    }
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        // One turn is drained fully before the next prompt is read
        session.run_turn(input, &mut stdout).await?;
        println!();
    }

    Ok(())
}
