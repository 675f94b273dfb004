//! Segmentación de una tabla multi-ensayo en sesiones ordenadas.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{KinematicsError, Result};
use crate::types::{Frame, FrameTable, Session, SessionKey, TIME_ZERO_TOLERANCE};

/// Preferencia de segmentación configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Columna de sesión si existe; si no, `time ≈ 0`
    #[default]
    Auto,
    TimeZero,
    /// Variante de animación: el tiempo retrocede o vale 0 fuera de la primera fila
    TimeReset,
}

/// Estrategia concreta, elegida una vez por dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSplit {
    Column,
    TimeZero,
    TimeReset,
}

impl SessionSplit {
    /// Resuelve el modo configurado contra el esquema de la tabla
    pub fn select(mode: SplitMode, table: &FrameTable, time_column: &str) -> Result<Self> {
        let split = match mode {
            SplitMode::Auto if table.session_keys.is_some() => SessionSplit::Column,
            SplitMode::Auto | SplitMode::TimeZero => SessionSplit::TimeZero,
            SplitMode::TimeReset => SessionSplit::TimeReset,
        };
        if split != SessionSplit::Column && !table.schema.has_time {
            return Err(KinematicsError::MissingColumn {
                column: time_column.to_string(),
            });
        }
        Ok(split)
    }

    /// Parte la tabla en sesiones `(etiqueta, sesión)` ordenadas
    pub fn segment(self, table: &FrameTable) -> Result<Vec<Session>> {
        let sessions = match self {
            SessionSplit::Column => split_by_column(table)?,
            SessionSplit::TimeZero => split_at_boundaries(table, time_zero_starts(&table.frames)),
            SessionSplit::TimeReset => split_at_boundaries(table, time_reset_starts(&table.frames)),
        };
        for session in &sessions {
            check_monotonic(session)?;
        }
        debug!(strategy = ?self, sessions = sessions.len(), "tabla segmentada");
        Ok(sessions)
    }
}

/// Atajo: selecciona con `SplitMode::Auto` y segmenta
pub fn segment(table: &FrameTable) -> Result<Vec<Session>> {
    SessionSplit::select(SplitMode::Auto, table, "time")?.segment(table)
}

/// Sesión `n` (base 1) de la lista
pub fn select_session(sessions: &[Session], n: usize) -> Result<&Session> {
    if n == 0 || n > sessions.len() {
        return Err(KinematicsError::SessionOutOfRange {
            requested: n,
            available: sessions.len(),
        });
    }
    Ok(&sessions[n - 1])
}

fn split_by_column(table: &FrameTable) -> Result<Vec<Session>> {
    let keys = table
        .session_keys
        .as_ref()
        .ok_or_else(|| KinematicsError::MissingColumn {
            column: "session_id".to_string(),
        })?;

    let mut groups: BTreeMap<&SessionKey, Vec<Frame>> = BTreeMap::new();
    for (key, frame) in keys.iter().zip(&table.frames) {
        groups.entry(key).or_default().push(frame.clone());
    }

    Ok(groups
        .into_iter()
        .map(|(key, frames)| Session::new(key.label(), Arc::clone(&table.schema), frames))
        .collect())
}

fn is_time_zero(t: Option<f64>) -> bool {
    matches!(t, Some(t) if t.abs() <= TIME_ZERO_TOLERANCE)
}

/// Cada fila con `time ≈ 0` abre una sesión
fn time_zero_starts(frames: &[Frame]) -> Vec<usize> {
    frames
        .iter()
        .enumerate()
        .filter(|(_, f)| is_time_zero(f.time))
        .map(|(i, _)| i)
        .collect()
}

/// La primera fila, y cada fila donde el tiempo retrocede o vuelve a 0.
/// Los tiempos ausentes heredan el último valor conocido.
fn time_reset_starts(frames: &[Frame]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut prev: Option<f64> = None;
    for (i, frame) in frames.iter().enumerate() {
        let t = frame.time.or(prev).unwrap_or(0.0);
        let reset = match prev {
            None => true,
            Some(p) => t < p || t == 0.0,
        };
        if reset {
            starts.push(i);
        }
        prev = Some(t);
    }
    starts
}

fn split_at_boundaries(table: &FrameTable, starts: Vec<usize>) -> Vec<Session> {
    let schema = &table.schema;
    if starts.is_empty() {
        return vec![Session::new("1", Arc::clone(schema), table.frames.clone())];
    }
    if starts[0] > 0 {
        warn!(
            dropped = starts[0],
            "filas anteriores al primer inicio de sesión descartadas"
        );
    }

    let mut bounds = starts;
    bounds.push(table.frames.len());
    bounds
        .windows(2)
        .enumerate()
        .map(|(n, w)| {
            Session::new(
                (n + 1).to_string(),
                Arc::clone(schema),
                table.frames[w[0]..w[1]].to_vec(),
            )
        })
        .collect()
}

fn check_monotonic(session: &Session) -> Result<()> {
    let mut last: Option<f64> = None;
    for (row, frame) in session.frames.iter().enumerate() {
        let Some(t) = frame.time.filter(|t| t.is_finite()) else {
            continue;
        };
        if matches!(last, Some(prev) if t < prev) {
            return Err(KinematicsError::NonMonotonicTime {
                session: session.label.clone(),
                row,
            });
        }
        last = Some(t);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NameIndex, Schema};

    fn table(times: &[f64], keys: Option<&[&str]>) -> FrameTable {
        let frames = times
            .iter()
            .enumerate()
            .map(|(i, &t)| Frame {
                frame_index: i as i64,
                time: if t.is_nan() { None } else { Some(t) },
                landmarks: vec![],
                channels: vec![],
            })
            .collect();
        FrameTable {
            schema: Arc::new(Schema {
                landmarks: NameIndex::default(),
                channels: NameIndex::default(),
                has_time: true,
            }),
            frames,
            session_keys: keys.map(|k| k.iter().map(|s| SessionKey::parse(s)).collect()),
        }
    }

    fn shape(sessions: &[Session]) -> Vec<(String, usize)> {
        sessions.iter().map(|s| (s.label.clone(), s.len())).collect()
    }

    #[test]
    fn test_time_zero_split() {
        let t = table(&[0.0, 0.1, 0.2, 0.0, 0.1], None);
        let sessions = segment(&t).unwrap();
        assert_eq!(
            shape(&sessions),
            vec![("1".to_string(), 3), ("2".to_string(), 2)]
        );
    }

    #[test]
    fn test_no_boundary_is_single_session() {
        let t = table(&[0.5, 0.6, 0.7], None);
        let sessions = segment(&t).unwrap();
        assert_eq!(shape(&sessions), vec![("1".to_string(), 3)]);
    }

    #[test]
    fn test_time_zero_tolerance() {
        let t = table(&[1e-10, 0.1, -1e-10, 0.1], None);
        assert_eq!(segment(&t).unwrap().len(), 2);
    }

    #[test]
    fn test_column_split_orders_by_key() {
        let t = table(
            &[0.0, 0.1, 0.0, 0.2, 0.1],
            Some(&["10", "10", "2", "10", "2"]),
        );
        let sessions = segment(&t).unwrap();
        assert_eq!(
            shape(&sessions),
            vec![("2".to_string(), 2), ("10".to_string(), 3)]
        );
        // la concatenación reproduce el multiconjunto de filas
        let mut rows: Vec<i64> = sessions
            .iter()
            .flat_map(|s| s.frames.iter().map(|f| f.frame_index))
            .collect();
        rows.sort();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_time_reset_split() {
        let t = table(&[0.0, 0.1, 0.2, 0.05, 0.1, 0.0, 0.1, f64::NAN], None);
        let sessions = SessionSplit::TimeReset.segment(&t).unwrap();
        assert_eq!(
            shape(&sessions),
            vec![
                ("1".to_string(), 3),
                ("2".to_string(), 2),
                ("3".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_time_reset_ignores_session_column() {
        let t = table(&[0.0, 0.1, 0.0], Some(&["a", "a", "a"]));
        let split = SessionSplit::select(SplitMode::TimeReset, &t, "time").unwrap();
        assert_eq!(split.segment(&t).unwrap().len(), 2);
    }

    #[test]
    fn test_decreasing_time_inside_session_fails() {
        let t = table(&[0.0, 0.2, 0.1], None);
        let err = segment(&t).unwrap_err();
        assert!(matches!(err, KinematicsError::NonMonotonicTime { row: 2, .. }));
    }

    #[test]
    fn test_missing_time_column() {
        let mut t = table(&[0.0], None);
        Arc::make_mut(&mut t.schema).has_time = false;
        let err = segment(&t).unwrap_err();
        assert!(matches!(err, KinematicsError::MissingColumn { .. }));
    }

    #[test]
    fn test_select_session_range() {
        let t = table(&[0.0, 0.1, 0.0], None);
        let sessions = segment(&t).unwrap();
        assert_eq!(select_session(&sessions, 2).unwrap().label, "2");
        assert!(matches!(
            select_session(&sessions, 3),
            Err(KinematicsError::SessionOutOfRange { requested: 3, available: 2 })
        ));
        assert!(select_session(&sessions, 0).is_err());
    }
}
