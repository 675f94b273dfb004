use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::error::KinematicsError;
use crate::types::{Frame, NameIndex, Schema, Session, Vec3};

/// Nombre del landmark que recibe la posición del balón
pub const BALL_LANDMARK: &str = "ball";

#[derive(Debug, Deserialize)]
struct TrialFile {
    #[serde(default)]
    tracking: Vec<TrackingFrame>,
}

#[derive(Debug, Deserialize)]
struct TrackingFrame {
    #[serde(default)]
    frame: Option<f64>,
    /// Milisegundos
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    data: Option<FrameData>,
}

#[derive(Debug, Default, Deserialize)]
struct FrameData {
    #[serde(default)]
    player: Option<HashMap<String, Value>>,
    #[serde(default)]
    ball: Option<Value>,
}

/// Componente numérica o texto numérico (`"1.5"`); lo demás es `NaN`
fn to_coord(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        other => other.as_f64().unwrap_or(f64::NAN),
    }
}

/// `[x, y, z]`; `null` o texto no numérico cuentan como `NaN`
fn to_xyz(value: &Value) -> Option<Vec3> {
    let items = value.as_array().filter(|a| a.len() == 3)?;
    let c = |i: usize| to_coord(&items[i]);
    let p = Vec3::new(c(0), c(1), c(2));
    p.any_finite().then_some(p)
}

/// Lee un ensayo JSON (`tracking[].{frame, time, data.player, data.ball}`)
/// como una única sesión.
///
/// El tiempo sale del timestamp en ms; si falta, de `frame / fps`.
pub fn read_trial<R: Read>(reader: R, label: &str, fps: f64) -> Result<Session, KinematicsError> {
    let trial: TrialFile = serde_json::from_reader(reader)?;
    if trial.tracking.is_empty() {
        return Err(KinematicsError::EmptyInput);
    }

    let mut names: BTreeSet<&str> = BTreeSet::new();
    for fr in &trial.tracking {
        if let Some(player) = fr.data.as_ref().and_then(|d| d.player.as_ref()) {
            names.extend(player.keys().map(String::as_str));
        }
    }
    let mut landmarks = NameIndex::new(names.iter().copied());
    let ball = landmarks.insert(BALL_LANDMARK.to_string());

    let frames = trial
        .tracking
        .iter()
        .enumerate()
        .map(|(row, fr)| {
            let frame_index = fr
                .frame
                .filter(|f| f.is_finite())
                .map(|f| f as i64)
                .unwrap_or(row as i64);
            let time = fr
                .time
                .filter(|t| t.is_finite())
                .map(|ms| ms / 1000.0)
                .or_else(|| (fps > 0.0).then(|| frame_index as f64 / fps));

            let mut points = vec![None; landmarks.len()];
            if let Some(data) = &fr.data {
                if let Some(player) = &data.player {
                    for (name, value) in player {
                        if let Some(idx) = landmarks.get(name) {
                            points[idx] = to_xyz(value);
                        }
                    }
                }
                points[ball] = data.ball.as_ref().and_then(to_xyz);
            }

            Frame {
                frame_index,
                time,
                landmarks: points,
                channels: Vec::new(),
            }
        })
        .collect();

    let schema = Schema {
        landmarks,
        channels: NameIndex::default(),
        has_time: true,
    };
    Ok(Session::new(label, Arc::new(schema), frames))
}

/// Carga un ensayo desde fichero; la etiqueta es el nombre sin extensión
pub fn load_trial(path: impl AsRef<Path>, fps: f64) -> Result<Session> {
    let path = path.as_ref();
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "1".to_string());
    let file = std::fs::File::open(path)
        .with_context(|| format!("No se pudo abrir el JSON {:?}", path))?;
    read_trial(file, &label, fps).with_context(|| format!("Ensayo inválido: {:?}", path))
}
