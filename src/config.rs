use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::angles::JointCatalog;
use crate::csv_loader::TableOptions;
use crate::event_detector::DetectorParams;
use crate::segmenter::SplitMode;
use crate::types::{TimeUnit, DEFAULT_FPS};

/// Configuración de un análisis completo
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub segmentation: SplitMode,
    pub time_unit: TimeUnit,
    pub time_column: String,
    pub session_column: String,
    pub frame_column: String,
    /// Campo explícito del evento en segundos (default: "MER_time")
    pub event_time_column: String,
    /// Par (proximal, distal) cuya distancia alimenta el detector adaptativo.
    /// Si falta, el evento sale de `event_time_column`.
    pub event_landmarks: Option<[String; 2]>,
    /// Articulaciones a calcular; `None` si la tabla no trae landmarks
    pub joints: Option<JointCatalog>,
    /// Frecuencia de respaldo para la base de tiempos (default: 30)
    pub fps: f64,
    /// Ventana de suavizado de las señales que se entregan a los gráficos
    pub smoothing_window: usize,
    pub detector: DetectorParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            segmentation: SplitMode::Auto,
            time_unit: TimeUnit::Seconds,
            time_column: "time".to_string(),
            session_column: "session_id".to_string(),
            frame_column: "frame".to_string(),
            event_time_column: "MER_time".to_string(),
            event_landmarks: None,
            joints: None,
            fps: DEFAULT_FPS,
            smoothing_window: 5,
            detector: DetectorParams::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Configuración JSON inválida")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer la configuración {:?}", path))?;
        Self::from_json_str(&text).with_context(|| format!("En {:?}", path))
    }

    /// Parámetros del detector con `fps` como frecuencia de último recurso
    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            fallback_rate_hz: self.fps,
            ..self.detector.clone()
        }
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            time_column: self.time_column.clone(),
            session_column: self.session_column.clone(),
            frame_column: self.frame_column.clone(),
            time_unit: self.time_unit,
            // la variante de animación arrastra el último tiempo válido
            lenient_time: self.segmentation == SplitMode::TimeReset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = AnalysisConfig::from_json_str(
            r#"{
                "segmentation": "time_reset",
                "time_unit": "milliseconds",
                "joints": "pitching",
                "detector": { "contact_ratio": 0.2, "sample_rate_hz": 120.0 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.segmentation, SplitMode::TimeReset);
        assert_eq!(cfg.time_unit, TimeUnit::Milliseconds);
        assert_eq!(cfg.joints, Some(JointCatalog::Pitching));
        assert_eq!(cfg.detector.contact_ratio, 0.2);
        assert_eq!(cfg.detector.rise_ratio, 0.06);
        assert_eq!(cfg.detector.sample_rate_hz, Some(120.0));
        assert_eq!(cfg.event_time_column, "MER_time");
        assert!(cfg.event_landmarks.is_none());
        assert!(cfg.table_options().lenient_time);
        assert!(!AnalysisConfig::default().table_options().lenient_time);
    }

    #[test]
    fn test_fps_feeds_detector_fallback() {
        let cfg = AnalysisConfig::from_json_str(
            r#"{"fps": 120, "event_landmarks": ["hand_jc", "ball"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.detector_params().fallback_rate_hz, 120.0);
        assert_eq!(cfg.detector_params().contact_ratio, 0.15);
        assert_eq!(cfg.event_landmarks.as_ref().unwrap()[1], "ball");
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(AnalysisConfig::from_json_str(r#"{"segmentation": "magic"}"#).is_err());
    }
}
