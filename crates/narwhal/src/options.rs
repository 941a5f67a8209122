use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How gravity scales with a node's distance from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GravityMode {
    /// Pull proportional to distance (`mass * gravity * distance`).
    #[default]
    Linear,
    /// Classic ForceAtlas2 gravity: constant `mass * gravity` whatever the distance.
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceAtlas2Options {
    /// Hard iteration cap; the engine stops here even without convergence.
    pub max_iterations: usize,
    /// Absolute repulsion scale. When unset, `scaling_ratio_per_node * node_count` is used.
    pub scaling_ratio: Option<f64>,
    pub scaling_ratio_per_node: f64,
    /// Absolute gravity constant. When unset, `gravity_per_node * node_count` is used.
    pub gravity: Option<f64>,
    pub gravity_per_node: f64,
    pub gravity_mode: GravityMode,
    /// Divide a source node's attraction by its out-degree so hubs do not over-attract.
    pub outbound_attraction_distribution: bool,
    /// Account for node radii in repulsion and attraction (anti-collision).
    pub adjust_sizes: bool,
    /// Logarithmic attraction (`ln(1 + d)`), which tightens clusters.
    pub lin_log_mode: bool,
    /// Exponent applied to edge weights; 0 ignores weights.
    pub edge_weight_influence: f64,
    pub jitter_tolerance: f64,
    /// Approximate repulsion with the Barnes-Hut quadtree instead of summing every pair.
    pub barnes_hut_optimize: bool,
    /// Barnes-Hut opening criterion: a region whose `size / distance` is below this value is
    /// treated as a single body. Must be in `(0, 2]` so a node never approximates a region that
    /// contains itself.
    pub barnes_hut_theta: f64,
    /// Mean traction per unit of movable mass under which an iteration counts as calm.
    pub convergence_epsilon: f64,
    /// Consecutive calm iterations required to stop early as converged.
    pub convergence_window: usize,
    /// Seed for the initial placement of nodes that have no imported position.
    pub random_seed: u64,
    /// Worker threads for the force computation; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for ForceAtlas2Options {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            scaling_ratio: None,
            scaling_ratio_per_node: 1.5,
            gravity: None,
            gravity_per_node: 1.0,
            gravity_mode: GravityMode::Linear,
            outbound_attraction_distribution: true,
            adjust_sizes: true,
            lin_log_mode: false,
            edge_weight_influence: 1.0,
            jitter_tolerance: 1.0,
            barnes_hut_optimize: true,
            barnes_hut_theta: 1.2,
            convergence_epsilon: 0.01,
            convergence_window: 5,
            random_seed: 1,
            threads: None,
        }
    }
}

impl ForceAtlas2Options {
    pub fn scaling_ratio_for(&self, node_count: usize) -> f64 {
        self.scaling_ratio
            .unwrap_or(self.scaling_ratio_per_node * node_count as f64)
    }

    pub fn gravity_for(&self, node_count: usize) -> f64 {
        self.gravity
            .unwrap_or(self.gravity_per_node * node_count as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self.scaling_ratio {
            positive("forceatlas2.scalingRatio", v)?;
        }
        positive("forceatlas2.scalingRatioPerNode", self.scaling_ratio_per_node)?;
        if let Some(v) = self.gravity {
            non_negative("forceatlas2.gravity", v)?;
        }
        non_negative("forceatlas2.gravityPerNode", self.gravity_per_node)?;
        non_negative("forceatlas2.edgeWeightInfluence", self.edge_weight_influence)?;
        positive("forceatlas2.jitterTolerance", self.jitter_tolerance)?;
        positive("forceatlas2.barnesHutTheta", self.barnes_hut_theta)?;
        if self.barnes_hut_theta > 2.0 {
            return Err(Error::InvalidOption {
                name: "forceatlas2.barnesHutTheta",
                reason: format!("must be at most 2, got {}", self.barnes_hut_theta),
            });
        }
        non_negative("forceatlas2.convergenceEpsilon", self.convergence_epsilon)?;
        if self.convergence_window == 0 {
            return Err(Error::InvalidOption {
                name: "forceatlas2.convergenceWindow",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidOption {
                name: "forceatlas2.threads",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelAdjustOptions {
    pub enabled: bool,
    pub max_iterations: usize,
    /// Inflate each label box by the node circle so both stay clear.
    pub adjust_by_size: bool,
    /// Fraction of the overlap depth resolved per iteration.
    pub speed: f64,
    /// Extra clearance around every box.
    pub margin: f64,
    /// Handed to the text measurer; the deterministic measurer ignores it.
    pub font_family: Option<String>,
    pub font_size: f64,
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl Default for LabelAdjustOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 200,
            adjust_by_size: true,
            speed: 1.0,
            margin: 1.0,
            font_family: None,
            font_size: 12.0,
            char_width_factor: 0.6,
            line_height_factor: 1.2,
        }
    }
}

impl LabelAdjustOptions {
    pub fn validate(&self) -> Result<()> {
        positive("labelAdjust.speed", self.speed)?;
        non_negative("labelAdjust.margin", self.margin)?;
        positive("labelAdjust.fontSize", self.font_size)?;
        positive("labelAdjust.charWidthFactor", self.char_width_factor)?;
        positive("labelAdjust.lineHeightFactor", self.line_height_factor)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    pub forceatlas2: ForceAtlas2Options,
    pub label_adjust: LabelAdjustOptions,
}

impl LayoutOptions {
    pub fn validate(&self) -> Result<()> {
        self.forceatlas2.validate()?;
        self.label_adjust.validate()
    }
}

fn positive(name: &'static str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidOption {
            name,
            reason: format!("must be a positive finite number, got {v}"),
        })
    }
}

fn non_negative(name: &'static str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidOption {
            name,
            reason: format!("must be a non-negative finite number, got {v}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ForceAtlas2Options, LayoutOptions};
    use crate::error::Error;

    #[test]
    fn defaults_scale_with_node_count() {
        let opts = ForceAtlas2Options::default();
        assert_eq!(opts.scaling_ratio_for(10), 15.0);
        assert_eq!(opts.gravity_for(10), 10.0);
    }

    #[test]
    fn absolute_values_override_per_node_defaults() {
        let opts = ForceAtlas2Options {
            scaling_ratio: Some(2.0),
            gravity: Some(0.5),
            ..Default::default()
        };
        assert_eq!(opts.scaling_ratio_for(1000), 2.0);
        assert_eq!(opts.gravity_for(1000), 0.5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let opts: LayoutOptions = serde_json::from_str(
            r#"{ "forceatlas2": { "maxIterations": 50, "linLogMode": true }, "labelAdjust": { "enabled": false } }"#,
        )
        .unwrap();
        assert_eq!(opts.forceatlas2.max_iterations, 50);
        assert!(opts.forceatlas2.lin_log_mode);
        assert_eq!(opts.forceatlas2.barnes_hut_theta, 1.2);
        assert!(!opts.label_adjust.enabled);
        assert_eq!(opts.label_adjust.max_iterations, 200);
    }

    #[test]
    fn rejects_theta_out_of_range() {
        let mut opts = LayoutOptions::default();
        opts.forceatlas2.barnes_hut_theta = 3.0;
        assert!(matches!(
            opts.validate(),
            Err(Error::InvalidOption {
                name: "forceatlas2.barnesHutTheta",
                ..
            })
        ));
    }

    #[test]
    fn rejects_nan_gravity() {
        let mut opts = LayoutOptions::default();
        opts.forceatlas2.gravity = Some(f64::NAN);
        assert!(opts.validate().is_err());
    }
}
