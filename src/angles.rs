//! Motor de ángulos articulares: flexión por tripleta
//! (proximal, vértice, distal) a partir de las posiciones 3D por frame.

use serde::Deserialize;

use crate::error::Result;
use crate::types::{Frame, LandmarkId, Schema, Session, Signal, Vec3};
use crate::vector_math::{angle_magnitude_deg, first_valid, midpoint};

/// Punto de una tripleta: un landmark o el centroide de dos (la mano).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkRef {
    Single(LandmarkId),
    Centroid(LandmarkId, LandmarkId),
}

impl LandmarkRef {
    pub fn resolve(&self, frame: &Frame) -> Option<Vec3> {
        match *self {
            LandmarkRef::Single(id) => frame.landmark(id),
            LandmarkRef::Centroid(a, b) => {
                let (pa, pb) = (frame.landmark(a), frame.landmark(b));
                let both = pa.is_some_and(Vec3::any_finite) && pb.is_some_and(Vec3::any_finite);
                if both {
                    midpoint(pa, pb)
                } else {
                    first_valid(&[pa, pb])
                }
            }
        }
    }
}

/// Tres puntos cuyo ángulo incluido define una señal articular.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointTriple {
    pub name: String,
    pub proximal: LandmarkRef,
    pub vertex: LandmarkRef,
    pub distal: LandmarkRef,
}

impl JointTriple {
    /// `180° − ángulo incluido`: 0° = extensión completa
    pub fn flexion(&self, frame: &Frame) -> Option<f64> {
        let vertex = self.vertex.resolve(frame)?;
        let u = self.proximal.resolve(frame)? - vertex;
        let v = self.distal.resolve(frame)? - vertex;
        angle_magnitude_deg(u, v).map(|a| 180.0 - a)
    }

    pub fn flexion_signal(&self, session: &Session) -> Signal {
        Signal::new(
            self.name.clone(),
            session.frames.iter().map(|f| self.flexion(f)).collect(),
        )
    }
}

/// Nombre de landmark en el catálogo, antes de resolverlo contra el esquema
#[derive(Debug, Clone, Copy)]
enum Point {
    One(&'static str),
    Hand(&'static str, &'static str),
}

struct JointSpec {
    name: &'static str,
    proximal: Point,
    vertex: Point,
    distal: Point,
}

const fn joint(name: &'static str, proximal: Point, vertex: Point, distal: Point) -> JointSpec {
    JointSpec {
        name,
        proximal,
        vertex,
        distal,
    }
}

use self::Point::{Hand, One};

/// Tiro libre: landmarks `R_*`/`L_*` del JSON de seguimiento
const SHOOTING_JOINTS: [JointSpec; 6] = [
    joint("WRIST_R", One("R_ELBOW"), One("R_WRIST"), Hand("R_1STFINGER", "R_5THFINGER")),
    joint("WRIST_L", One("L_ELBOW"), One("L_WRIST"), Hand("L_1STFINGER", "L_5THFINGER")),
    joint("ELBOW_R", One("R_SHOULDER"), One("R_ELBOW"), One("R_WRIST")),
    joint("ELBOW_L", One("L_SHOULDER"), One("L_ELBOW"), One("L_WRIST")),
    joint("KNEE_R", One("R_HIP"), One("R_KNEE"), One("R_ANKLE")),
    joint("KNEE_L", One("L_HIP"), One("L_KNEE"), One("L_ANKLE")),
];

/// Lanzamiento: centros articulares del brazo de lanzar, del guante y de las piernas
const PITCHING_JOINTS: [JointSpec; 6] = [
    joint("WRIST_THROW", One("elbow_jc"), One("wrist_jc"), One("hand_jc")),
    joint("WRIST_GLOVE", One("glove_elbow_jc"), One("glove_wrist_jc"), One("glove_hand_jc")),
    joint("ELBOW_THROW", One("shoulder_jc"), One("elbow_jc"), One("wrist_jc")),
    joint("ELBOW_GLOVE", One("glove_shoulder_jc"), One("glove_elbow_jc"), One("glove_wrist_jc")),
    joint("KNEE_LEAD", One("lead_hip"), One("lead_knee_jc"), One("lead_ankle_jc")),
    joint("KNEE_REAR", One("rear_hip"), One("rear_knee_jc"), One("rear_ankle_jc")),
];

const SHOOTING_SKELETON: [(&str, &str); 12] = [
    ("R_SHOULDER", "R_ELBOW"),
    ("R_ELBOW", "R_WRIST"),
    ("L_SHOULDER", "L_ELBOW"),
    ("L_ELBOW", "L_WRIST"),
    ("R_SHOULDER", "L_SHOULDER"),
    ("R_SHOULDER", "R_HIP"),
    ("L_SHOULDER", "L_HIP"),
    ("R_HIP", "L_HIP"),
    ("R_HIP", "R_KNEE"),
    ("R_KNEE", "R_ANKLE"),
    ("L_HIP", "L_KNEE"),
    ("L_KNEE", "L_ANKLE"),
];

const PITCHING_SKELETON: [(&str, &str); 14] = [
    ("glove_shoulder_jc", "glove_elbow_jc"),
    ("glove_elbow_jc", "glove_wrist_jc"),
    ("glove_wrist_jc", "glove_hand_jc"),
    ("shoulder_jc", "elbow_jc"),
    ("elbow_jc", "wrist_jc"),
    ("wrist_jc", "hand_jc"),
    ("glove_shoulder_jc", "shoulder_jc"),
    ("glove_shoulder_jc", "lead_hip"),
    ("shoulder_jc", "rear_hip"),
    ("lead_hip", "rear_hip"),
    ("rear_hip", "rear_knee_jc"),
    ("rear_knee_jc", "rear_ankle_jc"),
    ("lead_hip", "lead_knee_jc"),
    ("lead_knee_jc", "lead_ankle_jc"),
];

/// Conjunto de articulaciones de cada gesto deportivo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointCatalog {
    Shooting,
    Pitching,
}

impl JointCatalog {
    fn specs(self) -> &'static [JointSpec] {
        match self {
            JointCatalog::Shooting => &SHOOTING_JOINTS,
            JointCatalog::Pitching => &PITCHING_JOINTS,
        }
    }

    /// Pares de landmarks que dibuja el esqueleto
    pub fn skeleton(self) -> &'static [(&'static str, &'static str)] {
        match self {
            JointCatalog::Shooting => &SHOOTING_SKELETON,
            JointCatalog::Pitching => &PITCHING_SKELETON,
        }
    }

    /// Resuelve el catálogo contra el esquema. Un landmark sin columnas es
    /// un error estructural; la mano acepta que falte uno de los dos dedos.
    pub fn resolve(self, schema: &Schema) -> Result<Vec<JointTriple>> {
        let point = |p: Point| -> Result<LandmarkRef> {
            match p {
                One(name) => Ok(LandmarkRef::Single(schema.require_landmark(name)?)),
                Hand(a, b) => match (schema.landmark(a), schema.landmark(b)) {
                    (Some(a), Some(b)) => Ok(LandmarkRef::Centroid(a, b)),
                    (Some(id), None) | (None, Some(id)) => Ok(LandmarkRef::Single(id)),
                    (None, None) => Ok(LandmarkRef::Single(schema.require_landmark(a)?)),
                },
            }
        };

        self.specs()
            .iter()
            .map(|spec| {
                Ok(JointTriple {
                    name: spec.name.to_string(),
                    proximal: point(spec.proximal)?,
                    vertex: point(spec.vertex)?,
                    distal: point(spec.distal)?,
                })
            })
            .collect()
    }
}

/// Calcula todas las señales de flexión de un catálogo ya resuelto
#[derive(Debug, Clone)]
pub struct AngleEngine {
    triples: Vec<JointTriple>,
}

impl AngleEngine {
    pub fn new(catalog: JointCatalog, schema: &Schema) -> Result<Self> {
        Ok(Self {
            triples: catalog.resolve(schema)?,
        })
    }

    pub fn triples(&self) -> &[JointTriple] {
        &self.triples
    }

    /// Una señal por tripleta, cada una de la longitud de la sesión
    pub fn compute(&self, session: &Session) -> Vec<Signal> {
        self.triples
            .iter()
            .map(|t| t.flexion_signal(session))
            .collect()
    }
}

/// Distancia euclídea por frame entre dos landmarks (p. ej. muñeca–balón)
pub fn distance_signal(session: &Session, name: &str, a: LandmarkRef, b: LandmarkRef) -> Signal {
    Signal::new(
        name,
        session
            .frames
            .iter()
            .map(|f| match (a.resolve(f), b.resolve(f)) {
                (Some(pa), Some(pb)) => Some(pa.distance(pb)).filter(|d| d.is_finite()),
                _ => None,
            })
            .collect(),
    )
}

/// Segmentos del esqueleto presentes en un frame
pub fn skeleton_segments(catalog: JointCatalog, session: &Session, frame: usize) -> Vec<(Vec3, Vec3)> {
    let Some(frame) = session.frames.get(frame) else {
        return Vec::new();
    };
    catalog
        .skeleton()
        .iter()
        .filter_map(|(a, b)| {
            let pa = frame.landmark(session.schema.landmark(a)?)?;
            let pb = frame.landmark(session.schema.landmark(b)?)?;
            (pa.is_finite() && pb.is_finite()).then_some((pa, pb))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KinematicsError;
    use crate::types::NameIndex;
    use std::sync::Arc;

    const SHOOTING_NAMES: [&str; 16] = [
        "R_SHOULDER", "L_SHOULDER", "R_ELBOW", "L_ELBOW", "R_WRIST", "L_WRIST", "R_HIP", "L_HIP",
        "R_KNEE", "L_KNEE", "R_ANKLE", "L_ANKLE", "R_1STFINGER", "R_5THFINGER", "L_1STFINGER",
        "L_5THFINGER",
    ];

    fn schema(names: &[&str]) -> Arc<Schema> {
        Arc::new(Schema {
            landmarks: NameIndex::new(names.iter().copied()),
            channels: NameIndex::default(),
            has_time: true,
        })
    }

    fn frame(points: Vec<Option<Vec3>>) -> Frame {
        Frame {
            frame_index: 0,
            time: Some(0.0),
            landmarks: points,
            channels: vec![],
        }
    }

    fn triple(schema: &Schema, a: &str, b: &str, c: &str) -> JointTriple {
        JointTriple {
            name: "J".into(),
            proximal: LandmarkRef::Single(schema.landmark(a).unwrap()),
            vertex: LandmarkRef::Single(schema.landmark(b).unwrap()),
            distal: LandmarkRef::Single(schema.landmark(c).unwrap()),
        }
    }

    #[test]
    fn straight_limb_has_zero_flexion() {
        let s = schema(&["a", "b", "c"]);
        let t = triple(&s, "a", "b", "c");
        let f = frame(vec![
            Some(Vec3::new(0.0, 0.0, 0.0)),
            Some(Vec3::new(0.0, 1.0, 0.0)),
            Some(Vec3::new(0.0, 2.0, 0.0)),
        ]);
        assert!(t.flexion(&f).unwrap().abs() < 1e-9);
    }

    #[test]
    fn right_angle_is_ninety_degrees_flexion() {
        let s = schema(&["a", "b", "c"]);
        let t = triple(&s, "a", "b", "c");
        let f = frame(vec![
            Some(Vec3::new(1.0, 0.0, 0.0)),
            Some(Vec3::ZERO),
            Some(Vec3::new(0.0, 0.0, 1.0)),
        ]);
        assert!((t.flexion(&f).unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn missing_landmark_propagates_as_none() {
        let s = schema(&["a", "b", "c"]);
        let t = triple(&s, "a", "b", "c");
        let f = frame(vec![Some(Vec3::ZERO), None, Some(Vec3::new(1.0, 0.0, 0.0))]);
        assert!(t.flexion(&f).is_none());
    }

    #[test]
    fn hand_centroid_uses_midpoint_or_single_finger() {
        let s = schema(&["f1", "f5"]);
        let hand = LandmarkRef::Centroid(LandmarkId(0), LandmarkId(1));
        let both = frame(vec![Some(Vec3::new(0.0, 0.0, 0.0)), Some(Vec3::new(2.0, 0.0, 0.0))]);
        assert_eq!(hand.resolve(&both), Some(Vec3::new(1.0, 0.0, 0.0)));

        let one = frame(vec![None, Some(Vec3::new(2.0, 0.0, 0.0))]);
        assert_eq!(hand.resolve(&one), Some(Vec3::new(2.0, 0.0, 0.0)));

        let none = frame(vec![None, Some(Vec3::new(f64::NAN, f64::NAN, f64::NAN))]);
        assert!(hand.resolve(&none).is_none());
        assert_eq!(s.landmarks.len(), 2);
    }

    #[test]
    fn engine_signals_match_session_length() {
        let s = schema(&SHOOTING_NAMES);
        let engine = AngleEngine::new(JointCatalog::Shooting, &s).unwrap();
        let frames = (0..4)
            .map(|i| {
                frame(
                    (0..SHOOTING_NAMES.len())
                        .map(|k| Some(Vec3::new(k as f64, (i * k) as f64, 1.0)))
                        .collect(),
                )
            })
            .collect();
        let session = Session::new("1", s, frames);
        let signals = engine.compute(&session);
        assert_eq!(signals.len(), 6);
        assert!(signals.iter().all(|sig| sig.len() == session.len()));
        assert_eq!(signals[0].name, "WRIST_R");
        let names: Vec<&str> = engine.triples().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["WRIST_R", "WRIST_L", "ELBOW_R", "ELBOW_L", "KNEE_R", "KNEE_L"]);
    }

    #[test]
    fn catalog_requires_landmark_columns() {
        let s = schema(&["R_SHOULDER"]);
        let err = AngleEngine::new(JointCatalog::Shooting, &s).unwrap_err();
        assert!(matches!(err, KinematicsError::MissingLandmark { .. }));
    }

    #[test]
    fn catalog_accepts_single_finger() {
        let names: Vec<&str> = SHOOTING_NAMES
            .iter()
            .copied()
            .filter(|n| *n != "R_5THFINGER")
            .collect();
        let s = schema(&names);
        let triples = JointCatalog::Shooting.resolve(&s).unwrap();
        assert!(matches!(triples[0].distal, LandmarkRef::Single(_)));
        assert!(matches!(triples[1].distal, LandmarkRef::Centroid(_, _)));
    }

    #[test]
    fn distance_and_skeleton() {
        let s = schema(&["shoulder_jc", "elbow_jc"]);
        let session = Session::new(
            "1",
            Arc::clone(&s),
            vec![
                frame(vec![Some(Vec3::ZERO), Some(Vec3::new(3.0, 4.0, 0.0))]),
                frame(vec![Some(Vec3::ZERO), None]),
            ],
        );
        let a = LandmarkRef::Single(LandmarkId(0));
        let b = LandmarkRef::Single(LandmarkId(1));
        let d = distance_signal(&session, "d", a, b);
        assert_eq!(d.values, vec![Some(5.0), None]);

        assert_eq!(skeleton_segments(JointCatalog::Pitching, &session, 0).len(), 1);
        assert!(skeleton_segments(JointCatalog::Pitching, &session, 1).is_empty());
        assert!(skeleton_segments(JointCatalog::Pitching, &session, 7).is_empty());
    }
}
