//! Two-body orbital mechanics.
pub mod orbits;
pub mod patched;
pub mod phase;
pub mod vis_viva;

/// A request that has no answer on the given orbit.
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum OrbitError {
    /// A hyperbolic orbit never reaches true anomalies at or beyond its
    /// asymptotes.
    #[error("true anomaly {ta} is beyond the asymptote at ±{limit}")]
    Unreachable { ta: f64, limit: f64 },
    /// A hyperbolic orbit passed this true anomaly before the requested time.
    #[error("true anomaly {ta} was already passed")]
    Passed { ta: f64 },
}
