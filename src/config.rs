//! Tunable geometry parameters shared by every container built from one
//! [`Context`](crate::context::Context).

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshError;

/// Smallest tolerance a container accepts.
pub const MIN_TOLERANCE: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Coincidence tolerance for vertices and tree searches.
    pub tolerance: f64,
    /// Maximum number of cells in a cell-tree leaf.
    pub skd_leaf_capacity: usize,
    /// Radius growth factor between point-projection attempts.
    pub projection_growth: f64,
    /// Tolerance of point-in-cell tests.
    pub containment_tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            skd_leaf_capacity: 1,
            projection_growth: 1.5,
            containment_tolerance: 1e-12,
        }
    }
}

impl GeometryConfig {
    /// Parse a JSON object; missing fields take their default.
    pub fn from_json_str(json: &str) -> Result<Self, MeshError> {
        let cfg: GeometryConfig =
            serde_json::from_str(json).map_err(|e| MeshError::Serialization(e.to_string()))?;
        Ok(cfg.sanitized())
    }

    /// Clamp every field into its usable range. A growth factor that would
    /// not enlarge the projection radius falls back to the default.
    pub fn sanitized(mut self) -> Self {
        self.tolerance = self.tolerance.max(MIN_TOLERANCE);
        self.skd_leaf_capacity = self.skd_leaf_capacity.max(1);
        self.projection_growth = sane_growth(self.projection_growth);
        self.containment_tolerance = self.containment_tolerance.max(0.0);
        self
    }
}

/// `growth` if it strictly enlarges a radius, else the default factor.
pub(crate) fn sane_growth(growth: f64) -> f64 {
    if growth.is_finite() && growth > 1.0 {
        growth
    } else {
        GeometryConfig::default().projection_growth
    }
}
