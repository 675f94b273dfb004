use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biomecanica::analysis::Analyzer;
use biomecanica::angles::{AngleEngine, JointCatalog, LandmarkRef};
use biomecanica::event_detector::{DetectorParams, EventStrategy};
use biomecanica::export::export_signals;
use biomecanica::trial_json::{load_trial, BALL_LANDMARK};
use biomecanica::types::{EventSource, DEFAULT_FPS};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    R,
    L,
}

impl Side {
    fn wrist(self) -> &'static str {
        match self {
            Side::R => "R_WRIST",
            Side::L => "L_WRIST",
        }
    }
}

/// Reproduce un tiro libre desde su JSON y localiza la suelta del balón
#[derive(Parser, Debug)]
#[command(author, version)]
struct Args {
    /// Ensayo JSON (`tracking[].data.player / ball`)
    #[arg(short, long)]
    input: PathBuf,

    /// Mano de tiro
    #[arg(short, long, value_enum, default_value = "r")]
    side: Side,

    /// Frecuencia de captura (Hz)
    #[arg(short, long, default_value_t = DEFAULT_FPS)]
    fps: f64,

    /// Ventana de suavizado de la distancia muñeca–balón (muestras)
    #[arg(long, default_value_t = 5)]
    smooth: usize,

    /// CSV de salida con los ángulos
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biomecanica=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    ensure!(args.fps.is_finite() && args.fps > 0.0, "--fps debe ser positivo, no {}", args.fps);
    println!("🏀 Reproduciendo ensayo desde {:?}", args.input);

    let session = load_trial(&args.input, args.fps)?;
    let schema = &session.schema;
    let wrist = schema.require_landmark(args.side.wrist())?;
    let ball = schema.require_landmark(BALL_LANDMARK)?;

    let params = DetectorParams {
        smooth_window: args.smooth,
        sample_rate_hz: Some(args.fps),
        ..DetectorParams::default()
    };
    let strategy = EventStrategy::Adaptive {
        proximal: LandmarkRef::Single(wrist),
        distal: LandmarkRef::Single(ball),
        params,
    };
    let engine = AngleEngine::new(JointCatalog::Shooting, schema)?;
    let report = Analyzer::new(Some(engine), Vec::new(), strategy).analyze(&session);

    println!("🎞️  {} frames", report.len());
    match report.event {
        Some(ev) => {
            let how = match ev.source {
                EventSource::Fallback => " (respaldo)",
                _ => "",
            };
            println!(
                "✋ Release: {:.3} s (frame {}){}",
                ev.time.unwrap_or(f64::NAN),
                ev.frame_index,
                how
            );
        }
        None => println!("✋ Release: NOT DETECTED"),
    }

    if let Some(path) = &args.export {
        let order = ["WRIST_R", "WRIST_L", "ELBOW_R", "ELBOW_L", "KNEE_R", "KNEE_L"];
        let signals: Vec<_> = order.iter().filter_map(|n| report.signal(n)).collect();
        export_signals(path, "time_s", &report.times, &signals)?;
        println!("💾 Ángulos exportados a {:?}", path);
    }

    Ok(())
}
