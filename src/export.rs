use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;

use crate::error::KinematicsError;
use crate::types::Signal;

/// Escribe las señales alineadas en el tiempo: una fila por frame, una
/// columna por señal y la columna de tiempo primero. Las muestras
/// indefinidas quedan como celdas vacías.
pub fn write_signals<W: Write>(
    writer: W,
    time_header: &str,
    times: &[Option<f64>],
    signals: &[&Signal],
) -> Result<(), KinematicsError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let mut header = Vec::with_capacity(signals.len() + 1);
    header.push(time_header.to_string());
    header.extend(signals.iter().map(|s| s.name.clone()));
    wtr.write_record(&header)?;

    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for (row, t) in times.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(cell(*t));
        for signal in signals {
            record.push(cell(signal.values.get(row).copied().flatten()));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exporta a fichero, creando el directorio padre si hace falta
pub fn export_signals(
    path: impl AsRef<Path>,
    time_header: &str,
    times: &[Option<f64>],
    signals: &[&Signal],
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("No se pudo crear el directorio {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("No se pudo crear el CSV {:?}", path))?;
    write_signals(file, time_header, times, signals)
        .with_context(|| format!("Error escribiendo {:?}", path))
}
