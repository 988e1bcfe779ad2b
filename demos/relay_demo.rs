//! Relay Demo
//!
//! Runs the full pipeline against a local "robot" that prints every command
//! line it receives. The detector is scripted: a marker drifts from the left
//! edge of the frame towards the center while getting closer, so the output
//! walks through turning, driving straight and stopping.
//!
//! Built with `--features apriltag,camera` the scripted detector is replaced
//! by the AprilTag detector running on the first system camera.
//!
//! Usage: `cargo run --example relay_demo [config.json]`

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tagrelay::{
    init_logging, ActuationCommand, ActuationLink, DebugAction, PipelineBuilder, PipelineEvent,
    RelayConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => RelayConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => RelayConfig::default(),
    };
    init_logging(&config.log_filter)?;

    println!("🤖 tagrelay Relay Demo");
    println!("======================");

    // Stand-in robot controller
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let robot_addr = listener.local_addr()?;
    let robot = tokio::spawn(async move {
        let (socket, _) = listener.accept().await?;
        let mut lines = BufReader::new(socket).lines();
        while let Some(line) = lines.next_line().await? {
            let command = ActuationCommand::parse_line(&line)?;
            println!("   🛞 robot received {:<20} stop={}", line, command.is_stop());
        }
        anyhow::Ok(())
    });

    let endpoint = format!("tcp://{}", robot_addr);
    let link = ActuationLink::connect(&endpoint, config.connect_timeout()).await?;
    println!("\n🔌 Actuation link open to {}", link.endpoint());

    #[cfg(feature = "apriltag")]
    let detector = {
        println!("🏷️  Detecting {} markers", config.apriltag.family);
        tagrelay::AprilTagDetector::new(config.apriltag.clone())
    };
    #[cfg(not(feature = "apriltag"))]
    let detector = scripted_marker(&config);

    let pipeline = PipelineBuilder::new(config)
        .detector(detector)
        .sink(Arc::new(link))
        .start()
        .await?;

    let mut events = pipeline.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PipelineEvent::TargetEstimated { estimate } => println!(
                    "   🎯 marker {} at {:.2} m, bearing {:+.1}°",
                    estimate.marker_id, estimate.distance_m, estimate.bearing_deg
                ),
                PipelineEvent::DebugReport { message } => println!("   🔎 {}", message),
                PipelineEvent::Stopped => break,
                _ => {}
            }
        }
    });

    pipeline.request_debug(DebugAction::CheckBinary)?;

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        println!("📊 {}", pipeline.overlay_line());
    }

    let stats = pipeline.shutdown().await?;
    watcher.await?;
    robot.await??;

    println!("\n📈 Final statistics:");
    println!("   Frames captured: {}", stats.frames_captured);
    println!("   Ticks skipped:   {}", stats.ticks_skipped);
    println!("   Commands sent:   {}", stats.commands_sent);
    println!("   Stale responses: {}", stats.stale_responses);

    println!("\n✨ Relay demo completed!");
    Ok(())
}

/// A marker drifting from the left edge to the center while approaching
#[cfg(not(feature = "apriltag"))]
fn scripted_marker(config: &RelayConfig) -> tagrelay::ScriptedDetector {
    use tagrelay::{Detection, ScriptedDetector};

    let width = config.source.fallback_resolution.width as f64;
    let height = config.source.fallback_resolution.height as f64;
    (0..40)
        .fold(ScriptedDetector::new(), |detector, step| {
            let t = step as f64 / 39.0;
            let cx = width * (0.1 + 0.4 * t);
            let side = 20.0 + 220.0 * t;
            detector.then_detect(vec![Detection::square(7, cx, height / 2.0, side)])
        })
        .with_latency(Duration::from_millis(40))
}
