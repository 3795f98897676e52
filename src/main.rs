use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use std::io::{BufRead, Write};
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voiceloop::llm::EchoGenerator;
use voiceloop::speech::{ConsoleSpeaker, ConsoleTranscriber};
use voiceloop::{OrchestratorBuilder, OrchestratorEvent, VoiceLoopConfig};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voiceloop=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => VoiceLoopConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => VoiceLoopConfig::default(),
    };

    info!("Starting voice loop with log {:?}", config.log_path);

    let (lines_tx, lines_rx) = unbounded();
    let (orchestrator, handle) = OrchestratorBuilder::new()
        .with_config(config.clone())
        .with_transcription(ConsoleTranscriber::new(lines_rx))
        .with_generation(EchoGenerator::new(config.generation.clone()))
        .with_synthesis(ConsoleSpeaker::new(config.synthesis.clone()))
        .build()?;

    let model_id = config.generation.model_id.clone();
    let echo_rx = handle.event_receiver();
    let echo = thread::spawn(move || console_echo(echo_rx, &model_id));
    let worker = thread::spawn(move || orchestrator.run());

    println!("\nReal-time transcription: type a line and press Enter (Ctrl-D to quit)");
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read console input")?;
        if lines_tx.send(line).is_err() {
            break;
        }
    }

    info!("Console input closed");
    if let Err(e) = handle.shutdown() {
        warn!("Orchestrator already stopped: {}", e);
    }
    drop(handle);

    worker
        .join()
        .map_err(|_| anyhow!("orchestrator thread panicked"))??;
    let _ = echo.join();

    Ok(())
}

fn console_echo(events: Receiver<OrchestratorEvent>, model_id: &str) {
    for event in events.iter() {
        match event {
            OrchestratorEvent::Partial(text) => {
                print!("{}\r", text);
                let _ = std::io::stdout().flush();
            }
            OrchestratorEvent::UserTurn(text) => {
                println!("\nUser: {}", text);
                println!("{}:", model_id);
            }
            OrchestratorEvent::TurnAborted(message) => eprintln!("{}", message),
            OrchestratorEvent::Shutdown => break,
            _ => {}
        }
    }
}
