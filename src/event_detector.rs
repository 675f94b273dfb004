//! Detección de un evento por sesión (suelta del balón, rotación externa
//! máxima): lectura del campo explícito o cruce de umbral adaptativo sobre
//! una señal de distancia.

use serde::Deserialize;
use tracing::{debug, info};

use crate::angles::{distance_signal, LandmarkRef};
use crate::signal::{
    finite_argmin, finite_count, finite_min, finite_percentile, median_positive_step,
    moving_average,
};
use crate::types::{ChannelId, Event, EventSource, Schema, Session, DEFAULT_FPS};

/// Parámetros del detector adaptativo.
///
/// Los umbrales se expresan respecto al rango dinámico observado
/// (`spread = p90 − mín`), no en unidades físicas.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Ventana de suavizado en muestras (<= 1 lo desactiva) (default: 5)
    pub smooth_window: usize,
    /// Radio de contacto = mín + ratio·spread (default: 0.15)
    pub contact_ratio: f64,
    /// Subida mínima = max(min_rise, ratio·spread) (default: 0.06)
    pub rise_ratio: f64,
    /// Suelo absoluto de la subida mínima (default: 0.01)
    pub min_rise: f64,
    /// Suelo de `spread` para señales casi constantes (default: 1e-6)
    pub spread_floor: f64,
    /// Ventana de persistencia tras el cruce (default: 100 ms)
    pub persistence_ms: f64,
    /// Mínimo de muestras de persistencia (default: 2)
    pub min_persistence_samples: usize,
    /// Tolerancia de monotonía en la regla de respaldo (default: 1e-6)
    pub monotonic_tolerance: f64,
    /// Mínimo de muestras finitas para intentar detectar (default: 5)
    pub min_finite_samples: usize,
    /// Frecuencia de muestreo; si falta se estima de los tiempos
    pub sample_rate_hz: Option<f64>,
    /// Frecuencia si tampoco se puede estimar (default: 30)
    pub fallback_rate_hz: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            smooth_window: 5,
            contact_ratio: 0.15,
            rise_ratio: 0.06,
            min_rise: 0.01,
            spread_floor: 1e-6,
            persistence_ms: 100.0,
            min_persistence_samples: 2,
            monotonic_tolerance: 1e-6,
            min_finite_samples: 5,
            sample_rate_hz: None,
            fallback_rate_hz: DEFAULT_FPS,
        }
    }
}

impl DetectorParams {
    /// Frecuencia configurada, o estimada con la mediana de los intervalos
    pub fn sample_rate(&self, times: &[Option<f64>]) -> f64 {
        self.sample_rate_hz
            .filter(|r| r.is_finite() && *r > 0.0)
            .or_else(|| median_positive_step(times).map(|dt| 1.0 / dt))
            .unwrap_or(self.fallback_rate_hz)
    }

    /// Muestras equivalentes a `persistence_ms` a la frecuencia dada.
    /// Los empates se redondean al par (2.5 → 2, 4.5 → 4).
    pub fn stay_samples(&self, rate_hz: f64) -> usize {
        let n = (self.persistence_ms * rate_hz / 1000.0).round_ties_even();
        let n = if n.is_finite() && n > 0.0 { n as usize } else { 0 };
        n.max(self.min_persistence_samples)
    }
}

/// Umbrales derivados de una señal concreta
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub dmin: f64,
    pub d90: f64,
    pub spread: f64,
    pub contact_radius: f64,
    pub rise_delta: f64,
    pub stay_samples: usize,
}

impl Thresholds {
    pub fn derive(ds: &[Option<f64>], params: &DetectorParams, rate_hz: f64) -> Option<Self> {
        let dmin = finite_min(ds)?;
        let d90 = finite_percentile(ds, 90.0)?;
        let spread = params.spread_floor.max(d90 - dmin);
        Some(Self {
            dmin,
            d90,
            spread,
            contact_radius: dmin + params.contact_ratio * spread,
            rise_delta: params.min_rise.max(params.rise_ratio * spread),
            stay_samples: params.stay_samples(rate_hz),
        })
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Segmento con todas las muestras finitas, o `None`
fn finite_segment(seg: &[Option<f64>]) -> Option<Vec<f64>> {
    seg.iter().map(|v| finite(*v)).collect()
}

/// Detector adaptativo sobre una señal de distancia cruda.
///
/// Devuelve la posición del evento y la regla que lo encontró. Que no haya
/// evento es un resultado esperado, no un error.
pub fn detect_adaptive(
    distance: &[Option<f64>],
    times: &[Option<f64>],
    params: &DetectorParams,
) -> Option<(usize, EventSource)> {
    let ds = moving_average(distance, params.smooth_window);
    if finite_count(&ds) < params.min_finite_samples {
        return None;
    }

    let rate = params.sample_rate(times);
    let th = Thresholds::derive(&ds, params, rate)?;
    debug!(
        dmin = th.dmin,
        d90 = th.d90,
        contact_radius = th.contact_radius,
        rise_delta = th.rise_delta,
        stay = th.stay_samples,
        "umbrales adaptativos"
    );

    let n = ds.len();
    let stay = th.stay_samples;
    let last_start = n.saturating_sub(stay);

    // Regla principal: cruce ascendente del radio de contacto que persiste
    for i in 1..last_start {
        let (Some(prev), Some(cur)) = (finite(ds[i - 1]), finite(ds[i])) else {
            continue;
        };
        if !(prev < th.contact_radius && cur >= th.contact_radius) {
            continue;
        }
        let Some(seg) = finite_segment(&ds[i..=i + stay]) else {
            continue;
        };
        let stays_out = seg.iter().all(|&v| v >= th.contact_radius);
        if stays_out && seg[seg.len() - 1] - seg[0] >= th.rise_delta {
            return Some((i, EventSource::Crossing));
        }
    }

    // Respaldo: tras el mínimo global, primera subida sostenida y monótona
    let k0 = finite_argmin(&ds)?;
    let base = finite(ds[k0])?;
    for j in (k0 + 1)..last_start {
        let Some(seg) = finite_segment(&ds[j..=j + stay]) else {
            continue;
        };
        let rises = seg[seg.len() - 1] - base >= th.rise_delta;
        let monotonic = seg
            .windows(2)
            .all(|w| w[1] - w[0] >= -params.monotonic_tolerance);
        if rises && monotonic {
            return Some((j, EventSource::Fallback));
        }
    }

    None
}

/// Primer valor finito del campo explícito de la sesión
pub fn explicit_event_time<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().find_map(finite)
}

/// Estrategia de detección, elegida una vez por dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum EventStrategy {
    /// Campo de tiempo explícito por sesión (segundos). `None` si la
    /// columna no existe en la fuente: ninguna sesión tendrá evento.
    ExplicitTime { channel: Option<ChannelId> },
    /// Cruce adaptativo sobre la distancia entre dos puntos
    Adaptive {
        proximal: LandmarkRef,
        distal: LandmarkRef,
        params: DetectorParams,
    },
}

impl EventStrategy {
    pub fn explicit(schema: &Schema, column: &str) -> Self {
        EventStrategy::ExplicitTime {
            channel: schema.channel(column),
        }
    }

    pub fn detect(&self, session: &Session) -> Option<Event> {
        let event = match self {
            EventStrategy::ExplicitTime { channel } => {
                channel.and_then(|id| explicit_event(session, id))
            }
            EventStrategy::Adaptive {
                proximal,
                distal,
                params,
            } => adaptive_event(session, *proximal, *distal, params),
        };
        if event.is_none() {
            info!(session = %session.label, "sin evento para la sesión");
        }
        event
    }
}

fn explicit_event(session: &Session, channel: ChannelId) -> Option<Event> {
    let time = explicit_event_time(session.frames.iter().map(|f| f.channel(channel)))?;
    let index = session.nearest_frame(time).unwrap_or(0);
    let frame = session.frames.get(index)?;
    Some(Event {
        index,
        frame_index: frame.frame_index,
        time: Some(time),
        source: EventSource::Explicit,
    })
}

fn adaptive_event(
    session: &Session,
    proximal: LandmarkRef,
    distal: LandmarkRef,
    params: &DetectorParams,
) -> Option<Event> {
    let distance = distance_signal(session, "distance", proximal, distal);
    let (index, source) = detect_adaptive(&distance.values, &session.times(), params)?;
    let frame = &session.frames[index];
    Some(Event {
        index,
        frame_index: frame.frame_index,
        time: frame.time,
        source,
    })
}
