use anyhow::Result;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vnadmin::{config::PipelineConfig, pipeline::Pipeline};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vnadmin=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) load config + exception tables ───────────────────────────
    let config_path = PipelineConfig::default_path();
    info!("config ← {}", config_path.display());
    let config = PipelineConfig::load(&config_path)?;
    let pipeline = Pipeline::new(config)?;
    info!(
        "outputs → {}",
        pipeline.config().output_dir.display()
    );

    // ─── 3) run every stage ──────────────────────────────────────────
    let start = Instant::now();
    let summary = pipeline.run()?;

    for b in &summary.boundaries {
        info!(level = %b.level, units = b.units, curated = b.curated, file = %b.file.display(), "boundaries");
    }
    for t in &summary.tables {
        info!(
            table = %t.name,
            rows = t.rows,
            resolved = t.resolved,
            unresolved = t.unresolved,
            tiers = ?t.tiers,
            "table"
        );
    }

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
