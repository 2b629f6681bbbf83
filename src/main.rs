use std::env;
use std::fs;

use delvebot::infra::{
    CompositeObserver, DEMO_LAYOUT, DefaultObserver, GameObserver, SandboxEnvironment,
    TranscriptObserver,
};
use delvebot::{Agent, AgentConfig, Game};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn get_env_var_bool(key: &str) -> bool {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<bool>().ok())
        .unwrap_or(false)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("delvebot=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = AgentConfig::from_env()?;
    let label = env::var("DELVEBOT_LABEL").unwrap_or_else(|_| "delvebot".to_string());
    let transcripts_folder = env::var("DELVEBOT_TRANSCRIPTS_FOLDER").ok();
    let print_map = get_env_var_bool("DELVEBOT_PRINT_MAP");

    let layout = match env::var("DELVEBOT_SANDBOX_MAP") {
        Ok(path) => {
            info!("Loading sandbox layout from {}", path);
            fs::read_to_string(&path)?
        }
        Err(_) => DEMO_LAYOUT.to_string(),
    };
    let environment = SandboxEnvironment::from_layout(&layout)?;

    let mut observers: Vec<Box<dyn GameObserver>> = vec![Box::new(DefaultObserver::new(print_map))];
    if let Some(folder) = transcripts_folder {
        let transcript = TranscriptObserver::create(&folder, &label)?;
        info!("Writing transcript to {}", transcript.path().display());
        observers.push(Box::new(transcript));
    }

    let mut game = Game::new(environment, CompositeObserver::new(observers)).with_label(label);
    let mut agent = Agent::new(config);
    let summary = game.run(&mut agent, || false).await?;

    match game.environment().ending() {
        Some(ending) => info!("Sandbox run ended: {}", ending),
        None => info!("Sandbox still running when the agent stopped"),
    }
    info!(
        "{} turns, deepest level {}, stop reason: {}",
        summary.turns,
        summary.max_depth,
        summary.reason.describe()
    );

    Ok(())
}
