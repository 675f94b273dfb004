use thiserror::Error;

/// Errores estructurales: abortan el análisis completo de la entrada.
///
/// Los huecos de datos (coordenadas ausentes, evento no encontrado) nunca
/// llegan aquí; viajan como `None` dentro de señales y eventos.
#[derive(Error, Debug)]
pub enum KinematicsError {
    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Missing landmark '{landmark}' (no _x/_y/_z columns)")]
    MissingLandmark { landmark: String },

    #[error("Time decreases inside session {session} at row {row}")]
    NonMonotonicTime { session: String, row: usize },

    #[error("Session {requested} is out of range (there are {available} sessions)")]
    SessionOutOfRange { requested: usize, available: usize },

    #[error("Input contains no frames")]
    EmptyInput,

    #[error("Invalid value '{value}' in column '{column}' (row {row})")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KinematicsError>;
