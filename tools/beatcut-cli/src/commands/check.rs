//! Check external tools and encoder capabilities.

use std::sync::Arc;
use std::time::Duration;

use beatcut_render_engine::runner::tool_available;
use beatcut_render_engine::{EncoderCaps, SystemRunner};

pub async fn run() -> anyhow::Result<()> {
    println!("Beatcut System Check");
    println!("{}", "=".repeat(50));

    let runner = Arc::new(SystemRunner::new(Duration::from_secs(10)));

    let ffmpeg = tool_available(runner.as_ref(), "ffmpeg").await;
    let ffprobe = tool_available(runner.as_ref(), "ffprobe").await;

    println!(
        "{} ffmpeg",
        if ffmpeg { "[OK]  " } else { "[FAIL]" }
    );
    println!(
        "{} ffprobe",
        if ffprobe { "[OK]  " } else { "[FAIL]" }
    );

    if !ffmpeg || !ffprobe {
        println!();
        println!("Install ffmpeg and ffprobe and make sure they are on PATH.");
        return Ok(());
    }

    let caps = EncoderCaps::detect(runner.as_ref()).await;
    println!();
    println!("Encoder capabilities:");
    println!(
        "  GPU H.264 encoding:   {}",
        caps.gpu_encoder()
            .unwrap_or("not available (CPU libx264 fallback)")
    );
    println!(
        "  GPU shader compose:   {}",
        if caps.has_gpu_pipeline() {
            "available"
        } else {
            "not available (CPU crossfade fallback)"
        }
    );

    println!();
    println!("Beatcut is ready.");
    Ok(())
}
