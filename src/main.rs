use anyhow::{Context, Result};
use aura_guide::capture::{CaptureBackendFactory, CaptureSource};
use aura_guide::haptics::LogHapticSink;
use aura_guide::history::MemoryHistory;
use aura_guide::session::SessionController;
use aura_guide::transport::GeminiLiveClient;
use aura_guide::Config;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "aura-guide")]
#[command(about = "Live AI navigation guide session controller")]
struct Args {
    /// Config file path (without extension)
    #[arg(short, long, default_value = "config/aura-guide")]
    config: String,

    /// Capture source: "device" or "synthetic"
    #[arg(short, long, default_value = "synthetic")]
    source: String,

    /// Initial navigation goal
    #[arg(short, long)]
    goal: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(goal) = args.goal {
        cfg.session.default_goal = goal;
    }

    info!("Aura Guide v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Engine model: {}", cfg.engine.model);

    let api_key = std::env::var(&cfg.engine.api_key_env)
        .with_context(|| format!("missing API key (set {})", cfg.engine.api_key_env))?;

    let source = match args.source.as_str() {
        "device" => CaptureSource::Device,
        "synthetic" => CaptureSource::Synthetic,
        other => anyhow::bail!("unknown capture source: {}", other),
    };
    let backend = CaptureBackendFactory::create(source, &cfg.audio)?;

    let transport = Arc::new(GeminiLiveClient::new(cfg.engine.endpoint.clone(), api_key));
    let history = Arc::new(MemoryHistory::new());
    let haptics = Arc::new(LogHapticSink);

    let controller = SessionController::new(
        cfg,
        backend,
        transport,
        history.clone(),
        haptics,
    );

    info!("Commands: toggle | stop | goal <text> | flip | mic | cam | status | history | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut mic_on = true;
    let mut cam_on = true;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, rest) = match line.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match cmd {
            "" => {}
            "toggle" | "t" => {
                if let Err(e) = controller.toggle().await {
                    error!("Session failed: {}", e);
                }
            }
            "stop" => controller.stop().await,
            "goal" => {
                if rest.is_empty() {
                    warn!("Usage: goal <text>");
                } else {
                    controller.set_goal(rest).await;
                    info!("Goal set: {}", rest);
                }
            }
            "flip" => {
                if let Err(e) = controller.switch_facing().await {
                    error!("Camera switch failed: {}", e);
                }
            }
            "mic" => {
                mic_on = !mic_on;
                controller.set_mic_enabled(mic_on);
                info!("Microphone {}", if mic_on { "on" } else { "muted" });
            }
            "cam" => {
                cam_on = !cam_on;
                controller.set_video_enabled(cam_on);
                info!("Camera {}", if cam_on { "on" } else { "paused" });
            }
            "status" => {
                let ctx = controller.context();
                info!("Status: {}", controller.status());
                info!("Goal: {}", ctx.goal());
                info!("Facing: {:?}", controller.facing());
                let caption = ctx.caption();
                if !caption.is_empty() {
                    info!("Caption: {}", caption);
                }
            }
            "history" => {
                let entries = history.snapshot().await;
                if entries.is_empty() {
                    info!("No recordings yet");
                }
                for artifact in entries {
                    info!(
                        "{} | {:.1}s | {} | {}",
                        artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
                        artifact.duration_secs,
                        artifact.goal,
                        artifact.media_path.display()
                    );
                }
            }
            "quit" | "q" => break,
            other => warn!("Unknown command: {}", other),
        }
    }

    controller.stop().await;
    info!("Goodbye");

    Ok(())
}
