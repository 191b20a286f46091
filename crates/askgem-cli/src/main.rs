//! Command-line entrypoint for askgem.
//!
//! ```text
//! askgem ask "What is the Agent Developer Kit from Google?"
//! askgem check-key
//! askgem diagnose
//! askgem event --endpoint index event.json
//! ```

mod diagnose;

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use askgem_agent::Agent;
use askgem_config::{ConfigError, Settings, API_KEY_VAR};
use askgem_core::Question;
use askgem_llm::GeminiClient;
use askgem_server::AppState;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_QUESTION: &str = "What is the Agent Developer Kit from Google?";

#[derive(Parser, Debug)]
#[command(name = "askgem", version, about = "Ask Gemini questions from the terminal")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the search-enabled agent one question
    Ask {
        #[arg(default_value = DEFAULT_QUESTION)]
        question: String,
    },
    /// Report whether the API key is set
    CheckKey,
    /// Send a test request and explain any failure
    Diagnose,
    /// Answer one serverless HTTP event and print the response envelope
    Event {
        /// Endpoint that handles the event
        #[arg(long, value_enum, default_value_t = Endpoint::Ask)]
        endpoint: Endpoint,
        /// Event JSON file; reads stdin when omitted
        file: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    /// `/api/ask`
    Ask,
    /// `/api/index`
    Index,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Command::Ask { question } => ask(&question).await,
        Command::CheckKey => Ok(check_key()),
        Command::Diagnose => diagnose().await,
        Command::Event { endpoint, file } => event(endpoint, file.as_deref()).await,
    }
}

async fn ask(question: &str) -> Result<ExitCode> {
    let settings = Settings::load()?;
    settings.require_api_key()?;

    let model = Arc::new(GeminiClient::from_settings(&settings, &settings.agent_model)?);
    let agent = Agent::helpful_assistant(model);
    info!("Agent ready on {}", settings.agent_model);

    let question = Question::new(question)?;
    debug!("Sending question: {}", question);

    let answer = agent.ask(&question).await?;
    println!("\n### Agent response:\n");
    println!("{}", answer);

    Ok(ExitCode::SUCCESS)
}

fn check_key() -> ExitCode {
    match Settings::load() {
        Ok(Settings { api_key: Some(_), .. }) => {
            println!("Gemini API Key setup complete.");
            ExitCode::SUCCESS
        }
        Ok(_) => {
            println!("Environment variable '{}' not found", API_KEY_VAR);
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("Unexpected error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn diagnose() -> Result<ExitCode> {
    println!("=== API KEY DIAGNOSTICS ===\n");

    let settings = Settings::load()?;
    let key = match settings.require_api_key() {
        Ok(key) => key.clone(),
        Err(ConfigError::MissingApiKey(var)) => {
            println!("{} is not set", var);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let diagnosis = diagnose::run(&settings, &key).await?;
    print!("{}", diagnosis.report());

    Ok(match diagnosis.is_success() {
        true => ExitCode::SUCCESS,
        false => ExitCode::FAILURE,
    })
}

async fn event(endpoint: Endpoint, file: Option<&Path>) -> Result<ExitCode> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw).context("reading event from stdin")?;
            raw
        }
    };

    let state = AppState::from_settings(Settings::load()?)?;
    let handler = match endpoint {
        Endpoint::Ask => &state.ask,
        Endpoint::Index => &state.index,
    };

    let response = handler.handle_event(&raw).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(match response.status_code {
        200..=299 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_defaults_question() {
        let cli = Cli::try_parse_from(["askgem", "ask"]).unwrap();
        match cli.command {
            Command::Ask { question } => assert_eq!(question, DEFAULT_QUESTION),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_subcommands_and_verbosity() {
        let cli = Cli::try_parse_from(["askgem", "-vv", "diagnose"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Diagnose));

        let cli = Cli::try_parse_from(["askgem", "check-key"]).unwrap();
        assert!(matches!(cli.command, Command::CheckKey));

        let cli = Cli::try_parse_from(["askgem", "ask", "Who are you?"]).unwrap();
        assert!(matches!(cli.command, Command::Ask { ref question } if question == "Who are you?"));
    }

    #[test]
    fn event_defaults_to_ask_and_stdin() {
        let cli = Cli::try_parse_from(["askgem", "event"]).unwrap();
        assert!(matches!(cli.command, Command::Event { endpoint: Endpoint::Ask, file: None }));

        let cli = Cli::try_parse_from(["askgem", "event", "--endpoint", "index", "event.json"]).unwrap();
        match cli.command {
            Command::Event { endpoint, file } => {
                assert_eq!(endpoint, Endpoint::Index);
                assert_eq!(file, Some(PathBuf::from("event.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["askgem", "event", "--endpoint", "other"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
