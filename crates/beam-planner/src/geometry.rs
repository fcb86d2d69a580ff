//! Angles and distances between Earth-centred points (km)

use nalgebra::Point3;
use tracing::warn;

/// Bound applied to the cosine before `acos`
pub const COSINE_BOUND: f64 = 1.0;

/// Clamp adjustments larger than this are logged as precision anomalies
pub const CLAMP_ANOMALY_THRESHOLD: f64 = 1e-6;

/// Planet centre
pub fn origin() -> Point3<f64> {
    Point3::origin()
}

/// Angle at `vertex` between the rays to `a` and `b`, in degrees.
///
/// NaN if `vertex` coincides with `a` or `b`.
pub fn angle_degrees(vertex: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let va = (a - vertex).normalize();
    let vb = (b - vertex).normalize();

    let dot = va.dot(&vb);
    let bounded = dot.clamp(-COSINE_BOUND, COSINE_BOUND);
    if (bounded - dot).abs() > CLAMP_ANOMALY_THRESHOLD {
        warn!(raw = dot, clamped = bounded, "dot product outside acos domain");
    }

    bounded.acos().to_degrees()
}

/// Euclidean distance in km
pub fn distance_km(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    nalgebra::distance(a, b)
}
