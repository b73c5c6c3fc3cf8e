//! Speak a few lines through the configured relay.
//!
//! ```text
//! NARRATION_TTS_URL=http://localhost:54321/functions/v1/text-to-speech \
//!     cargo run -p narration-core --example narrate -- "Hello|World"
//! ```

use narration_core::{NarrationConfig, NarrationEngine, Notice, Priority, SpeakOptions};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Welcome to Narration.|Each segment is followed by a pause.".into());

    let config = NarrationConfig::default().with_env_overrides();
    let engine = NarrationEngine::from_config(config)?;
    if engine.is_muted() {
        tracing::warn!("Voice is muted; unmuting for this demo");
        engine.set_muted(false);
    }

    let mut notices = engine.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(Notice::QuotaExhausted { title, description }) = notices.recv().await {
            tracing::warn!("{title}: {description}");
        }
    });

    let queued = engine.speak_once(
        "demo",
        &text,
        SpeakOptions::new()
            .with_priority(Priority::High)
            .on_start(|| tracing::info!("Segment started"))
            .on_end(|| tracing::info!("Segment finished"))
            .on_error(|err| tracing::error!("Segment failed: {err}")),
    );
    tracing::info!("Queued {queued} segment(s)");

    let mut state = engine.subscribe_state();
    tokio::time::sleep(Duration::from_millis(50)).await;
    while engine.is_speaking() || engine.pending_len() > 0 {
        state.changed().await?;
    }

    Ok(())
}
