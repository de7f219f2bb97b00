//! Cutting-line configuration.
//!
//! [`CuttingConfig`] is loaded once from a file-backed source (see
//! `cutline-io`) and shared read-only. Every field has a default so a
//! partial JSON document is accepted; a missing file means
//! [`CuttingConfig::default`].

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Geometry of the ring-type keyring hole and its tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringHoleConfig {
    /// Hole diameter in millimetres.
    pub diameter_mm: f64,
    /// Gap between the cutting line and the hole edge, in millimetres.
    pub edge_distance_mm: f64,
    /// Width of the bridge joining the tab to the body, in millimetres.
    pub bridge_width_mm: f64,
}

impl Default for KeyringHoleConfig {
    fn default() -> Self {
        Self {
            diameter_mm: 4.0,
            edge_distance_mm: 3.0,
            bridge_width_mm: 2.5,
        }
    }
}

/// Geometry of an internal (drilled) keyring hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalHoleConfig {
    /// Hole width in millimetres.
    pub width_mm: f64,
    /// Hole height in millimetres.
    pub height_mm: f64,
    /// Inset of the hole center from the cutting line edge, in millimetres.
    pub edge_distance_mm: f64,
}

impl Default for InternalHoleConfig {
    fn default() -> Self {
        Self {
            width_mm: 3.214,
            height_mm: 3.168,
            edge_distance_mm: 5.0,
        }
    }
}

/// Process-wide cutting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuttingConfig {
    /// Offset from the segmented shape to the print line, in millimetres.
    pub print_offset_mm: f64,
    /// Offset from the print line to the cutting line, in millimetres.
    pub cutting_offset_mm: f64,
    /// Corner-rounding strength of the offset edge blur. The default
    /// `0.02` gives an edge-blur kernel of half the offset distance.
    pub smoothing_factor: f64,
    /// Ring-type keyring hole geometry.
    pub keyring_hole: KeyringHoleConfig,
    /// Internal keyring hole geometry.
    pub internal_hole: InternalHoleConfig,
    /// Fee charged for drilling a keyring hole, in currency units.
    pub drilling_fee: u32,
}

impl CuttingConfig {
    /// Default print offset in millimetres.
    pub const DEFAULT_PRINT_OFFSET_MM: f64 = 2.0;
    /// Default cutting offset in millimetres.
    pub const DEFAULT_CUTTING_OFFSET_MM: f64 = 2.0;
    /// Default smoothing factor.
    pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.02;
    /// Default drilling fee.
    pub const DEFAULT_DRILLING_FEE: u32 = 100;

    /// Parse a JSON document, filling missing fields with defaults, and
    /// validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the JSON is malformed
    /// or any dimension is negative or non-finite.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every dimension is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fields = [
            ("print_offset_mm", self.print_offset_mm),
            ("cutting_offset_mm", self.cutting_offset_mm),
            ("smoothing_factor", self.smoothing_factor),
            ("keyring_hole.diameter_mm", self.keyring_hole.diameter_mm),
            (
                "keyring_hole.edge_distance_mm",
                self.keyring_hole.edge_distance_mm,
            ),
            (
                "keyring_hole.bridge_width_mm",
                self.keyring_hole.bridge_width_mm,
            ),
            ("internal_hole.width_mm", self.internal_hole.width_mm),
            ("internal_hole.height_mm", self.internal_hole.height_mm),
            (
                "internal_hole.edge_distance_mm",
                self.internal_hole.edge_distance_mm,
            ),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for CuttingConfig {
    fn default() -> Self {
        Self {
            print_offset_mm: Self::DEFAULT_PRINT_OFFSET_MM,
            cutting_offset_mm: Self::DEFAULT_CUTTING_OFFSET_MM,
            smoothing_factor: Self::DEFAULT_SMOOTHING_FACTOR,
            keyring_hole: KeyringHoleConfig::default(),
            internal_hole: InternalHoleConfig::default(),
            drilling_fee: Self::DEFAULT_DRILLING_FEE,
        }
    }
}
