pub mod analysis;
pub mod angles;
pub mod config;
pub mod csv_loader;
pub mod error;
pub mod event_detector;
pub mod export;
pub mod segmenter;
pub mod signal;
pub mod trial_json;
pub mod types;
pub mod vector_math;

pub use analysis::{analyze_table, Analyzer, SessionReport};
pub use config::AnalysisConfig;
pub use error::KinematicsError;
pub use types::{Event, EventSource, FrameTable, Session, Signal};
