use std::ops::{Add, Mul, Neg, Sub};

/// Punto o vector 3D de un landmark triangulado.
///
/// Las componentes pueden ser `NaN` tal como llegan de la captura; las
/// funciones de este módulo convierten esos casos en `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Todas las componentes son finitas
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Al menos una componente es finita
    pub fn any_finite(self) -> bool {
        self.x.is_finite() || self.y.is_finite() || self.z.is_finite()
    }

    pub fn components(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Punto medio componente a componente.
/// `None` si falta cualquiera de los dos o alguno tiene una componente no finita.
pub fn midpoint(a: Option<Vec3>, b: Option<Vec3>) -> Option<Vec3> {
    let (a, b) = (a?, b?);
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    Some((a + b) * 0.5)
}

/// Primer candidato con al menos una componente finita.
pub fn first_valid(candidates: &[Option<Vec3>]) -> Option<Vec3> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|p| p.any_finite())
}

/// Ángulo sin signo entre `u` y `v` en grados, rango [0, 180].
///
/// Se calcula como `atan2(|u×v|, u·v)`, estable cerca de 0° y 180°.
/// `None` si algún vector no es finito o tiene módulo cero.
pub fn angle_magnitude_deg(u: Vec3, v: Vec3) -> Option<f64> {
    if !u.is_finite() || !v.is_finite() {
        return None;
    }
    if u.length() == 0.0 || v.length() == 0.0 {
        return None;
    }
    let cross = u.cross(v).length();
    let dot = u.dot(v);
    Some(cross.atan2(dot).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn midpoint_averages_components() {
        let m = midpoint(Some(Vec3::new(0.0, 2.0, 4.0)), Some(Vec3::new(2.0, 4.0, 6.0))).unwrap();
        assert_eq!(m, Vec3::new(1.0, 3.0, 5.0));
    }

    #[test]
    fn midpoint_rejects_missing_or_partial() {
        let p = Some(Vec3::new(1.0, 1.0, 1.0));
        assert!(midpoint(p, None).is_none());
        assert!(midpoint(p, Some(Vec3::new(1.0, f64::NAN, 1.0))).is_none());
    }

    #[test]
    fn first_valid_skips_all_nan_candidates() {
        let nan = Some(Vec3::new(f64::NAN, f64::NAN, f64::NAN));
        let partial = Some(Vec3::new(f64::NAN, 2.0, f64::NAN));
        assert_eq!(first_valid(&[None, nan, partial]), partial);
        assert!(first_valid(&[None, nan]).is_none());
        assert!(first_valid(&[]).is_none());
    }

    #[test]
    fn angle_is_symmetric() {
        let u = Vec3::new(1.0, 2.0, -0.5);
        let v = Vec3::new(-3.0, 0.2, 1.0);
        let a = angle_magnitude_deg(u, v).unwrap();
        let b = angle_magnitude_deg(v, u).unwrap();
        assert!((a - b).abs() < EPS);
    }

    #[test]
    fn angle_extremes() {
        let u = Vec3::new(0.3, -1.2, 2.5);
        assert!(angle_magnitude_deg(u, u).unwrap().abs() < EPS);
        assert!((angle_magnitude_deg(u, -u).unwrap() - 180.0).abs() < EPS);
    }

    #[test]
    fn angle_right_angle() {
        let a = angle_magnitude_deg(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 3.0)).unwrap();
        assert!((a - 90.0).abs() < EPS);
    }

    #[test]
    fn angle_undefined_for_zero_or_nan() {
        let u = Vec3::new(1.0, 0.0, 0.0);
        assert!(angle_magnitude_deg(u, Vec3::ZERO).is_none());
        assert!(angle_magnitude_deg(u, Vec3::new(f64::NAN, 0.0, 1.0)).is_none());
    }
}
