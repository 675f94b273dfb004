//! Orquestación por sesión: señales de flexión, canales de la fuente y
//! evento. Las sesiones son independientes y pueden repartirse entre hilos.

use crossbeam_channel::unbounded;
use tracing::debug;

use crate::angles::{AngleEngine, LandmarkRef};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::event_detector::EventStrategy;
use crate::segmenter::SessionSplit;
use crate::signal::moving_average;
use crate::types::{Event, FrameTable, Schema, Session, Signal};

/// Resultado de analizar una sesión
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub label: String,
    pub times: Vec<Option<f64>>,
    pub signals: Vec<Signal>,
    pub event: Option<Event>,
}

impl SessionReport {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Copias suavizadas para los gráficos; los datos originales no cambian
    pub fn smoothed_signals(&self, window: usize) -> Vec<Signal> {
        self.signals
            .iter()
            .map(|s| Signal::new(s.name.clone(), moving_average(&s.values, window)))
            .collect()
    }

    pub fn event_time(&self) -> Option<f64> {
        self.event.and_then(|e| e.time)
    }
}

/// Cálculos por sesión, configurados una vez por dataset
#[derive(Debug, Clone)]
pub struct Analyzer {
    angles: Option<AngleEngine>,
    channels: Vec<String>,
    events: EventStrategy,
}

impl Analyzer {
    pub fn new(angles: Option<AngleEngine>, channels: Vec<String>, events: EventStrategy) -> Self {
        Self {
            angles,
            channels,
            events,
        }
    }

    /// Analizador para una tabla plana: flexiones del catálogo configurado,
    /// todos los canales salvo el del evento, y evento explícito o adaptativo
    /// según `event_landmarks`.
    pub fn for_table(cfg: &AnalysisConfig, schema: &Schema) -> Result<Self> {
        let angles = cfg
            .joints
            .map(|catalog| AngleEngine::new(catalog, schema))
            .transpose()?;
        let channels = schema
            .channels
            .names()
            .iter()
            .filter(|name| **name != cfg.event_time_column)
            .cloned()
            .collect();
        let events = match &cfg.event_landmarks {
            Some([proximal, distal]) => EventStrategy::Adaptive {
                proximal: LandmarkRef::Single(schema.require_landmark(proximal)?),
                distal: LandmarkRef::Single(schema.require_landmark(distal)?),
                params: cfg.detector_params(),
            },
            None => EventStrategy::explicit(schema, &cfg.event_time_column),
        };
        Ok(Self::new(angles, channels, events))
    }

    pub fn analyze(&self, session: &Session) -> SessionReport {
        let mut signals = self
            .angles
            .as_ref()
            .map(|engine| engine.compute(session))
            .unwrap_or_default();
        signals.extend(self.channels.iter().filter_map(|name| session.channel(name)));

        let event = self.events.detect(session);
        debug!(
            session = %session.label,
            frames = session.len(),
            signals = signals.len(),
            event = ?event.map(|e| e.index),
            "sesión analizada"
        );

        SessionReport {
            label: session.label.clone(),
            times: session.times(),
            signals,
            event,
        }
    }

    pub fn analyze_all(&self, sessions: &[Session]) -> Vec<SessionReport> {
        sessions.iter().map(|s| self.analyze(s)).collect()
    }

    /// Igual que `analyze_all`, repartiendo las sesiones entre `workers` hilos.
    /// El orden de salida es el de entrada.
    pub fn analyze_all_parallel(&self, sessions: &[Session], workers: usize) -> Vec<SessionReport> {
        let workers = workers.clamp(1, sessions.len().max(1));
        if workers == 1 {
            return self.analyze_all(sessions);
        }

        let (job_tx, job_rx) = unbounded::<(usize, &Session)>();
        let (result_tx, result_rx) = unbounded::<(usize, SessionReport)>();
        for job in sessions.iter().enumerate() {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (idx, session) in job_rx.iter() {
                        if result_tx.send((idx, self.analyze(session))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut reports: Vec<(usize, SessionReport)> = result_rx.iter().collect();
        reports.sort_by_key(|(idx, _)| *idx);
        reports.into_iter().map(|(_, r)| r).collect()
    }
}

/// Tabla → sesiones → informes, con la estrategia de segmentación configurada
pub fn analyze_table(table: &FrameTable, cfg: &AnalysisConfig) -> Result<(Vec<Session>, Vec<SessionReport>)> {
    let split = SessionSplit::select(cfg.segmentation, table, &cfg.time_column)?;
    let sessions = split.segment(table)?;
    let analyzer = Analyzer::for_table(cfg, &table.schema)?;
    let reports = analyzer.analyze_all(&sessions);
    Ok((sessions, reports))
}
