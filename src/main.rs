/*
Análisis biomecánico de capturas de movimiento por sesión.

Lee una tabla plana multi-ensayo (CSV), la divide en sesiones, calcula las
señales de flexión articular y localiza el evento de cada sesión (MER).

Ejemplos:
    ./target/release/biomecanica --input lanzamientos.csv --joints pitching
    ./target/release/biomecanica --input lanzamientos.csv --session 3 --export salida/
    RUST_LOG=biomecanica=debug ./target/release/biomecanica --input datos.csv --config analisis.json
*/

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biomecanica::analysis::Analyzer;
use biomecanica::angles::JointCatalog;
use biomecanica::config::AnalysisConfig;
use biomecanica::csv_loader::load_table;
use biomecanica::export::export_signals;
use biomecanica::segmenter::{select_session, SessionSplit, SplitMode};
use biomecanica::types::{EventSource, Session};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum JointsArg {
    Shooting,
    Pitching,
}

impl From<JointsArg> for JointCatalog {
    fn from(arg: JointsArg) -> Self {
        match arg {
            JointsArg::Shooting => JointCatalog::Shooting,
            JointsArg::Pitching => JointCatalog::Pitching,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitArg {
    Auto,
    TimeZero,
    TimeReset,
}

impl From<SplitArg> for SplitMode {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::Auto => SplitMode::Auto,
            SplitArg::TimeZero => SplitMode::TimeZero,
            SplitArg::TimeReset => SplitMode::TimeReset,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Ángulos articulares y eventos por sesión")]
struct Args {
    /// Tabla plana con los frames de todas las sesiones
    #[arg(short, long)]
    input: PathBuf,

    /// `all` o número de sesión (base 1)
    #[arg(short, long, default_value = "all")]
    session: String,

    /// Configuración JSON del análisis
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catálogo de articulaciones (sobrescribe la configuración)
    #[arg(short, long, value_enum)]
    joints: Option<JointsArg>,

    /// Estrategia de segmentación (sobrescribe la configuración)
    #[arg(long, value_enum)]
    split: Option<SplitArg>,

    /// Directorio donde escribir `session_<id>_signals.csv` y su versión suavizada
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Hilos para analizar sesiones en paralelo
    #[arg(short, long, default_value_t = 1)]
    workers: usize,
}

enum SessionChoice {
    All,
    One(usize),
}

fn parse_session(raw: &str) -> Result<SessionChoice> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(SessionChoice::All);
    }
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(SessionChoice::One(n)),
        _ => bail!("--session debe ser 'all' o un número >= 1, no '{}'", raw),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biomecanica=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let choice = parse_session(&args.session)?;

    let mut cfg = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(joints) = args.joints {
        cfg.joints = Some(joints.into());
    }
    if let Some(split) = args.split {
        cfg.segmentation = split.into();
    }

    println!("📂 Cargando {:?}", args.input);
    let table = load_table(&args.input, &cfg.table_options())?;
    let split = SessionSplit::select(cfg.segmentation, &table, &cfg.time_column)?;
    let sessions = split.segment(&table)?;
    info!(frames = table.len(), sessions = sessions.len(), split = ?split, "tabla segmentada");
    println!("🧩 {} sesiones ({} frames)", sessions.len(), table.len());

    let selected: Vec<Session> = match choice {
        SessionChoice::All => sessions,
        SessionChoice::One(n) => vec![select_session(&sessions, n)?.clone()],
    };

    let analyzer = Analyzer::for_table(&cfg, &table.schema)?;
    let reports = analyzer.analyze_all_parallel(&selected, args.workers);

    for report in &reports {
        let event = match report.event {
            Some(ev) => {
                let tag = match ev.source {
                    EventSource::Explicit => "",
                    EventSource::Crossing | EventSource::Fallback => " (estimado)",
                };
                match ev.time {
                    Some(t) => format!("{:.3} s{}", t, tag),
                    None => format!("frame {}{}", ev.frame_index, tag),
                }
            }
            None => "N/A".to_string(),
        };
        println!(
            "\n🎬 Sesión {} · {} frames · MER @ {}",
            report.label,
            report.len(),
            event
        );
        for signal in &report.signals {
            println!(
                "   {:<20} {:>5}/{} muestras válidas",
                signal.name,
                signal.finite_count(),
                signal.len()
            );
        }

        if let Some(dir) = &args.export {
            let path = dir.join(format!("session_{}_signals.csv", report.label));
            let signals: Vec<_> = report.signals.iter().collect();
            export_signals(&path, "time_s", &report.times, &signals)
                .with_context(|| format!("Exportando sesión {}", report.label))?;
            println!("   💾 {:?}", path);

            // copia suavizada para los gráficos
            let smoothed = report.smoothed_signals(cfg.smoothing_window);
            let path = dir.join(format!("session_{}_smoothed.csv", report.label));
            let signals: Vec<_> = smoothed.iter().collect();
            export_signals(&path, "time_s", &report.times, &signals)
                .with_context(|| format!("Exportando sesión {}", report.label))?;
        }
    }

    Ok(())
}
