use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::error::KinematicsError;
use crate::types::{
    Frame, FrameTable, NameIndex, Schema, SessionKey, TimeUnit, Vec3, AXIS_SUFFIXES,
};

/// Nombres de columnas especiales de la tabla plana
#[derive(Debug, Clone, PartialEq)]
pub struct TableOptions {
    pub time_column: String,
    pub session_column: String,
    pub frame_column: String,
    pub time_unit: TimeUnit,
    /// Un `time` no numérico cuenta como ausente en vez de abortar
    pub lenient_time: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            time_column: "time".to_string(),
            session_column: "session_id".to_string(),
            frame_column: "frame".to_string(),
            time_unit: TimeUnit::Seconds,
            lenient_time: false,
        }
    }
}

/// Destino de cada columna del CSV, resuelto una vez a partir de la cabecera
#[derive(Debug, Clone, Copy)]
enum Column {
    Time,
    Session,
    Frame,
    Coord { landmark: usize, axis: usize },
    Channel(usize),
}

/// Celda numérica; vacíos y `nan` son ausencias, no errores
fn parse_cell(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn split_axis(header: &str) -> Option<(&str, usize)> {
    AXIS_SUFFIXES.iter().enumerate().find_map(|(axis, suffix)| {
        header
            .strip_suffix(suffix)
            .filter(|base| !base.is_empty())
            .map(|base| (base, axis))
    })
}

/// Construye el esquema a partir de la cabecera.
/// Un landmark necesita sus tres columnas `_x/_y/_z`; si no, son canales.
fn build_schema(headers: &[String], opts: &TableOptions) -> (Schema, Vec<Column>) {
    let bases: BTreeSet<&str> = headers
        .iter()
        .filter_map(|h| split_axis(h).map(|(base, _)| base))
        .filter(|base| {
            AXIS_SUFFIXES
                .iter()
                .all(|s| headers.iter().any(|h| *h == format!("{base}{s}")))
        })
        .collect();

    let mut schema = Schema::default();
    let mut landmarks = NameIndex::default();
    let mut channels = NameIndex::default();

    let columns = headers
        .iter()
        .map(|h| {
            if *h == opts.time_column {
                schema.has_time = true;
                Column::Time
            } else if *h == opts.session_column {
                Column::Session
            } else if *h == opts.frame_column {
                Column::Frame
            } else if let Some((base, axis)) = split_axis(h).filter(|(b, _)| bases.contains(b)) {
                Column::Coord {
                    landmark: landmarks.insert(base.to_string()),
                    axis,
                }
            } else {
                Column::Channel(channels.insert(h.clone()))
            }
        })
        .collect();

    schema.landmarks = landmarks;
    schema.channels = channels;
    (schema, columns)
}

/// Lee una tabla plana multi-ensayo desde cualquier `Read`.
///
/// Formato: `time`, `session_id` opcional, tripletas `<base>_x/_y/_z` y
/// cualquier otra columna numérica como canal escalar.
pub fn read_table<R: Read>(reader: R, opts: &TableOptions) -> Result<FrameTable, KinematicsError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let (schema, columns) = build_schema(&headers, opts);
    let has_session = columns.iter().any(|c| matches!(c, Column::Session));

    let mut frames = Vec::new();
    let mut keys = Vec::new();
    let mut unkeyed = 0usize;
    let mut bad_times = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let mut frame = Frame {
            frame_index: row_idx as i64,
            time: None,
            landmarks: vec![None; schema.landmarks.len()],
            channels: vec![None; schema.channels.len()],
        };
        let mut coords = vec![[f64::NAN; 3]; schema.landmarks.len()];
        let mut key: Option<SessionKey> = None;

        for (col, raw) in columns.iter().zip(record.iter()) {
            match *col {
                Column::Time => {
                    if !raw.trim().is_empty() && raw.trim().parse::<f64>().is_err() {
                        if opts.lenient_time {
                            bad_times += 1;
                            continue;
                        }
                        return Err(KinematicsError::InvalidValue {
                            row: row_idx + 1,
                            column: opts.time_column.clone(),
                            value: raw.to_string(),
                        });
                    }
                    frame.time = parse_cell(raw).map(|t| opts.time_unit.to_seconds(t));
                }
                Column::Session => {
                    if !raw.trim().is_empty() {
                        key = Some(SessionKey::parse(raw));
                    }
                }
                Column::Frame => {
                    if let Some(v) = parse_cell(raw).filter(|v| v.is_finite()) {
                        frame.frame_index = v as i64;
                    }
                }
                Column::Coord { landmark, axis } => {
                    if let Some(v) = parse_cell(raw) {
                        coords[landmark][axis] = v;
                    }
                }
                Column::Channel(idx) => frame.channels[idx] = parse_cell(raw),
            }
        }

        for (slot, [x, y, z]) in frame.landmarks.iter_mut().zip(coords) {
            let p = Vec3::new(x, y, z);
            *slot = p.any_finite().then_some(p);
        }

        if has_session {
            match key {
                Some(k) => keys.push(k),
                None => {
                    unkeyed += 1;
                    continue;
                }
            }
        }
        frames.push(frame);
    }

    if bad_times > 0 {
        warn!(rows = bad_times, "tiempos no numéricos tratados como ausentes");
    }
    if unkeyed > 0 {
        warn!(rows = unkeyed, "filas sin identificador de sesión descartadas");
    }
    if frames.is_empty() {
        return Err(KinematicsError::EmptyInput);
    }
    debug!(
        frames = frames.len(),
        landmarks = schema.landmarks.len(),
        channels = schema.channels.len(),
        "tabla cargada"
    );

    Ok(FrameTable {
        schema: Arc::new(schema),
        frames,
        session_keys: has_session.then_some(keys),
    })
}

/// Carga la tabla desde un fichero CSV
pub fn load_table(path: impl AsRef<Path>, opts: &TableOptions) -> Result<FrameTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;
    read_table(file, opts).with_context(|| format!("CSV inválido: {:?}", path))
}
