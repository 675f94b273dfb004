use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{KinematicsError, Result};
pub use crate::vector_math::Vec3;

/// Tolerancia para considerar que `time` vale cero (inicio de sesión)
pub const TIME_ZERO_TOLERANCE: f64 = 1e-9;
/// Frecuencia de muestreo por defecto de las capturas (Hz)
pub const DEFAULT_FPS: f64 = 30.0;
/// Sufijos de las columnas de coordenadas de un landmark
pub const AXIS_SUFFIXES: [&str; 3] = ["_x", "_y", "_z"];

/// Unidad de la columna de tiempo de la fuente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    pub fn to_seconds(self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value,
            TimeUnit::Milliseconds => value / 1000.0,
        }
    }
}

/// Índice de nombres → posición, resuelto una sola vez al parsear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameIndex {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl NameIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for name in names {
            index.insert(name.into());
        }
        index
    }

    /// Añade un nombre (si no existe) y devuelve su posición
    pub fn insert(&mut self, name: String) -> usize {
        if let Some(&idx) = self.lookup.get(&name) {
            return idx;
        }
        let idx = self.names.len();
        self.lookup.insert(name.clone(), idx);
        self.names.push(name);
        idx
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Identificador tipado de un landmark dentro de un `Schema`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LandmarkId(pub usize);

/// Identificador tipado de un canal escalar dentro de un `Schema`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub usize);

/// Esquema explícito de la tabla: landmarks 3D y canales escalares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub landmarks: NameIndex,
    pub channels: NameIndex,
    /// La fuente trae columna de tiempo
    pub has_time: bool,
}

impl Schema {
    pub fn landmark(&self, name: &str) -> Option<LandmarkId> {
        self.landmarks.get(name).map(LandmarkId)
    }

    /// Como `landmark`, pero la ausencia total es un error estructural
    pub fn require_landmark(&self, name: &str) -> Result<LandmarkId> {
        self.landmark(name)
            .ok_or_else(|| KinematicsError::MissingLandmark {
                landmark: name.to_string(),
            })
    }

    pub fn channel(&self, name: &str) -> Option<ChannelId> {
        self.channels.get(name).map(ChannelId)
    }
}

/// Una observación muestreada en el tiempo
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_index: i64,
    /// Tiempo en segundos (ya convertido en la ingesta)
    pub time: Option<f64>,
    /// Indexado por `LandmarkId`
    pub landmarks: Vec<Option<Vec3>>,
    /// Indexado por `ChannelId`
    pub channels: Vec<Option<f64>>,
}

impl Frame {
    pub fn landmark(&self, id: LandmarkId) -> Option<Vec3> {
        self.landmarks.get(id.0).copied().flatten()
    }

    pub fn channel(&self, id: ChannelId) -> Option<f64> {
        self.channels.get(id.0).copied().flatten()
    }

    /// Todos los landmarks están presentes y con coordenadas finitas
    pub fn is_complete(&self) -> bool {
        self.landmarks
            .iter()
            .all(|p| matches!(p, Some(p) if p.is_finite()))
    }
}

/// Identificador de sesión leído de la columna explícita.
///
/// Los valores numéricos ordenan numéricamente y antes que los textuales.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionKey {
    Number(f64),
    Text(String),
}

impl SessionKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => SessionKey::Number(v),
            _ => SessionKey::Text(raw.to_string()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            SessionKey::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                format!("{}", *v as i64)
            }
            SessionKey::Number(v) => format!("{}", v),
            SessionKey::Text(s) => s.clone(),
        }
    }
}

impl Eq for SessionKey {}

impl PartialOrd for SessionKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SessionKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (SessionKey::Number(a), SessionKey::Number(b)) => a.total_cmp(b),
            (SessionKey::Number(_), SessionKey::Text(_)) => Ordering::Less,
            (SessionKey::Text(_), SessionKey::Number(_)) => Ordering::Greater,
            (SessionKey::Text(a), SessionKey::Text(b)) => a.cmp(b),
        }
    }
}

/// Tabla plana multi-ensayo tal como sale de la ingesta, antes de segmentar.
#[derive(Debug, Clone)]
pub struct FrameTable {
    pub schema: Arc<Schema>,
    pub frames: Vec<Frame>,
    /// Una clave por fila si la fuente trae columna de sesión
    pub session_keys: Option<Vec<SessionKey>>,
}

impl FrameTable {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Secuencia ordenada y contigua de frames de un mismo ensayo.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub label: String,
    pub schema: Arc<Schema>,
    pub frames: Vec<Frame>,
}

impl Session {
    pub fn new(label: impl Into<String>, schema: Arc<Schema>, frames: Vec<Frame>) -> Self {
        Self {
            label: label.into(),
            schema,
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn times(&self) -> Vec<Option<f64>> {
        self.frames.iter().map(|f| f.time).collect()
    }

    /// Canal escalar de la fuente expuesto como señal (p. ej. `pelvis_angle_z`)
    pub fn channel(&self, name: &str) -> Option<Signal> {
        let id = self.schema.channel(name)?;
        Some(Signal::new(
            name,
            self.frames.iter().map(|f| f.channel(id)).collect(),
        ))
    }

    /// Índice del frame cuyo tiempo está más cerca de `t`
    pub fn nearest_frame(&self, t: f64) -> Option<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.time.map(|ft| (i, (ft - t).abs())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Nueva sesión sin los frames con landmarks ausentes o no finitos
    pub fn complete_frames(&self) -> Session {
        let frames: Vec<Frame> = self
            .frames
            .iter()
            .filter(|f| f.is_complete())
            .cloned()
            .collect();
        let removed = self.frames.len() - frames.len();
        if removed > 0 {
            tracing::warn!(
                session = %self.label,
                removed,
                "frames descartados por coordenadas incompletas"
            );
        }
        Session::new(self.label.clone(), Arc::clone(&self.schema), frames)
    }

    /// Límites (mín, máx) finitos por eje sobre todos los landmarks.
    /// Un eje sin datos finitos devuelve (-1, 1).
    pub fn axis_limits(&self) -> [(f64, f64); 3] {
        let mut limits = [(f64::INFINITY, f64::NEG_INFINITY); 3];
        for point in self.frames.iter().flat_map(|f| f.landmarks.iter().flatten()) {
            for (axis, value) in point.components().into_iter().enumerate() {
                if value.is_finite() {
                    limits[axis].0 = limits[axis].0.min(value);
                    limits[axis].1 = limits[axis].1.max(value);
                }
            }
        }
        limits.map(|(lo, hi)| if lo <= hi { (lo, hi) } else { (-1.0, 1.0) })
    }
}

/// Secuencia con nombre alineada 1:1 con los frames de una sesión.
/// `None` marca muestras indefinidas.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Signal {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn finite_count(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_finite()).count()
    }
}

/// Origen del evento detectado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Campo explícito de la sesión (p. ej. `MER_time`)
    Explicit,
    /// Cruce ascendente del radio de contacto
    Crossing,
    /// Regla de respaldo tras el mínimo global
    Fallback,
}

/// Evento físico detectado en una sesión (suelta del balón, MER, ...)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Posición dentro de la sesión
    pub index: usize,
    pub frame_index: i64,
    /// Segundos
    pub time: Option<f64>,
    pub source: EventSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(i: i64, p: Option<Vec3>) -> Frame {
        Frame {
            frame_index: i,
            time: Some(i as f64 * 0.1),
            landmarks: vec![p],
            channels: vec![],
        }
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema {
            landmarks: NameIndex::new(["wrist"]),
            channels: NameIndex::default(),
            has_time: true,
        })
    }

    #[test]
    fn session_keys_sort_numerically() {
        let mut keys = vec![
            SessionKey::parse("10"),
            SessionKey::parse("2"),
            SessionKey::parse("b"),
            SessionKey::parse("1.5"),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(SessionKey::label).collect();
        assert_eq!(labels, vec!["1.5", "2", "10", "b"]);
    }

    #[test]
    fn complete_frames_drops_incomplete() {
        let s = Session::new(
            "1",
            schema(),
            vec![
                frame(0, Some(Vec3::new(1.0, 2.0, 3.0))),
                frame(1, None),
                frame(2, Some(Vec3::new(f64::NAN, 2.0, 3.0))),
                frame(3, Some(Vec3::new(0.0, 0.0, 0.0))),
            ],
        );
        let clean = s.complete_frames();
        assert_eq!(clean.len(), 2);
        assert_eq!(s.len(), 4);
        assert_eq!(clean.frames[1].frame_index, 3);
    }

    #[test]
    fn axis_limits_default_when_empty() {
        let s = Session::new("1", schema(), vec![frame(0, None)]);
        assert_eq!(s.axis_limits(), [(-1.0, 1.0); 3]);

        let s = Session::new(
            "1",
            schema(),
            vec![
                frame(0, Some(Vec3::new(-2.0, 1.0, f64::NAN))),
                frame(1, Some(Vec3::new(3.0, 0.5, f64::NAN))),
            ],
        );
        assert_eq!(s.axis_limits(), [(-2.0, 3.0), (0.5, 1.0), (-1.0, 1.0)]);
    }

    #[test]
    fn nearest_frame_by_time() {
        let s = Session::new(
            "1",
            schema(),
            (0..5).map(|i| frame(i, None)).collect(),
        );
        assert_eq!(s.nearest_frame(0.26), Some(3));
        assert_eq!(s.nearest_frame(-1.0), Some(0));
    }
}
