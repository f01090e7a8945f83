#![forbid(unsafe_code)]

use std::env;
use std::io::{self, IsTerminal};
use std::sync::Arc;

use engage_engines::identity::{
    BearerToken, EnvTokenProvider, StaticTokenProvider, TokenProvider, API_TOKEN_ENV,
};
use engage_os::config::EngagementConfig;
use engage_os::context::EngagementContext;
use engage_tools::cli::{execute_command, parse_command, Command};
use engage_tools::logging::{init_logging, LOG_ENV};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_command(&args)?;
    init_logging(env::var(LOG_ENV).ok().as_deref())?;

    let config = EngagementConfig::from_env();
    let tokens = token_provider(&command)?;
    tracing::debug!(state_dir = %config.state_dir.display(), "engage starting");
    let ctx = EngagementContext::open(config, tokens);

    let output = execute_command(&ctx, &command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn token_provider(command: &Command) -> Result<Arc<dyn TokenProvider>, String> {
    if EnvTokenProvider.get_token().is_some() {
        return Ok(Arc::new(EnvTokenProvider));
    }
    if !command.needs_api() || !io::stdin().is_terminal() {
        return Ok(Arc::new(StaticTokenProvider::signed_out()));
    }
    let prompt = format!("API token ({API_TOKEN_ENV} not set, empty to continue signed out):");
    let raw = rpassword::prompt_password(prompt).map_err(|e| e.to_string())?;
    Ok(Arc::new(StaticTokenProvider::new(BearerToken::new(raw))))
}
