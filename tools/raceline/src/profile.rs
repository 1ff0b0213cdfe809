//! Curvature estimation and speed profiling
//!
//! Curvature comes from finite differences over the point index, the same way
//! numpy's `gradient` works: centered in the interior, one-sided at the ends.
//! Each point then gets a base speed from a curvature table, trimmed when the
//! curve tightens ahead (entry braking) or raised when it opened up behind
//! (exit acceleration).

use crate::trajectory::TrajectoryPoint;
use log::info;
use raceline_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of the curvature to speed table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBand {
    /// Exclusive upper bound on |curvature| (1/m)
    pub max_curvature: f64,
    /// Base speed (m/s)
    pub speed: f64,
}

/// Profiler tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Ascending by `max_curvature`; first band whose bound exceeds |κ| wins
    pub speed_table: Vec<SpeedBand>,
    /// Base speed when |κ| is beyond every band
    pub fallback_speed: f64,
    /// Distance, in points, of the lookahead and lookbehind comparisons
    pub lookahead: usize,
    /// Curvature change that counts as tightening / opening
    pub trend_threshold: f64,
    /// Multiplier applied before a tightening curve
    pub entry_factor: f64,
    /// Multiplier applied after an opening curve
    pub exit_factor: f64,
    /// Cap on exit acceleration
    pub max_speed: f64,
    /// `dx² + dy²` at or below this gives zero curvature
    pub min_speed_epsilon: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            speed_table: vec![
                SpeedBand {
                    max_curvature: 0.02,
                    speed: 10.50,
                },
                SpeedBand {
                    max_curvature: 0.05,
                    speed: 10.45,
                },
                SpeedBand {
                    max_curvature: 0.10,
                    speed: 10.20,
                },
            ],
            fallback_speed: 9.90,
            lookahead: 5,
            trend_threshold: 0.001,
            entry_factor: 0.95,
            exit_factor: 1.10,
            max_speed: 10.50,
            min_speed_epsilon: 0.0,
        }
    }
}

impl ProfileConfig {
    /// Load a YAML config; missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        let config = Self::from_yaml(&contents)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: ProfileConfig =
            serde_yaml::from_str(contents).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::ConfigError(msg));

        if self.lookahead == 0 {
            return invalid("lookahead must be at least 1".to_string());
        }
        let mut last_bound = f64::NEG_INFINITY;
        for band in &self.speed_table {
            if !band.max_curvature.is_finite() || band.max_curvature <= last_bound {
                return invalid(format!(
                    "speed_table bounds must be finite and ascending, got {} after {}",
                    band.max_curvature, last_bound
                ));
            }
            if !(band.speed > 0.0) {
                return invalid(format!("speed_table speed must be positive, got {}", band.speed));
            }
            last_bound = band.max_curvature;
        }
        for (name, value) in [
            ("fallback_speed", self.fallback_speed),
            ("entry_factor", self.entry_factor),
            ("exit_factor", self.exit_factor),
            ("max_speed", self.max_speed),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        if !(self.min_speed_epsilon >= 0.0) {
            return invalid(format!(
                "min_speed_epsilon must be non-negative, got {}",
                self.min_speed_epsilon
            ));
        }
        if !self.trend_threshold.is_finite() {
            return invalid("trend_threshold must be finite".to_string());
        }
        Ok(())
    }

    /// Speed from the table for a curvature, ignoring trends.
    pub fn base_speed(&self, curvature: f64) -> f64 {
        let magnitude = curvature.abs();
        self.speed_table
            .iter()
            .find(|band| magnitude < band.max_curvature)
            .map(|band| band.speed)
            .unwrap_or(self.fallback_speed)
    }
}

/// Finite-difference derivative with respect to index.
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    values[1] - values[0]
                } else if i == n - 1 {
                    values[n - 1] - values[n - 2]
                } else {
                    (values[i + 1] - values[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Signed curvature at every point of a path.
pub fn curvature(points: &[(f64, f64)], min_speed_epsilon: f64) -> Vec<f64> {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let dx = gradient(&xs);
    let dy = gradient(&ys);
    let ddx = gradient(&dx);
    let ddy = gradient(&dy);

    (0..points.len())
        .map(|i| {
            let speed_sq = dx[i] * dx[i] + dy[i] * dy[i];
            if speed_sq <= min_speed_epsilon {
                0.0
            } else {
                (dx[i] * ddy[i] - dy[i] * ddx[i]) / speed_sq.powf(1.5)
            }
        })
        .collect()
}

/// Per-point speeds from a curvature series.
pub fn speeds_from_curvature(curvature: &[f64], config: &ProfileConfig) -> Vec<f64> {
    let n = curvature.len();
    let look = config.lookahead;

    (0..n)
        .map(|i| {
            let base = config.base_speed(curvature[i]);
            let tightening = i + look < n && curvature[i + look] - curvature[i] > config.trend_threshold;
            let opening = i >= look && curvature[i - look] - curvature[i] > config.trend_threshold;
            if tightening {
                base * config.entry_factor
            } else if opening {
                (base * config.exit_factor).min(config.max_speed)
            } else {
                base
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedProfile {
    pub curvature: Vec<f64>,
    pub speeds: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSummary {
    pub min_speed: f64,
    pub max_speed: f64,
    pub mean_speed: f64,
    pub max_abs_curvature: f64,
}

impl SpeedProfile {
    pub fn summary(&self) -> Option<ProfileSummary> {
        if self.speeds.is_empty() {
            return None;
        }
        let min_speed = self.speeds.iter().copied().fold(f64::INFINITY, f64::min);
        let max_speed = self.speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_speed = self.speeds.iter().sum::<f64>() / self.speeds.len() as f64;
        let max_abs_curvature = self
            .curvature
            .iter()
            .map(|k| k.abs())
            .filter(|k| k.is_finite())
            .fold(0.0, f64::max);
        Some(ProfileSummary {
            min_speed,
            max_speed,
            mean_speed,
            max_abs_curvature,
        })
    }
}

/// Curvature and target speed for every point of a path.
pub fn speed_profile(points: &[(f64, f64)], config: &ProfileConfig) -> SpeedProfile {
    let curvature = curvature(points, config.min_speed_epsilon);
    let speeds = speeds_from_curvature(&curvature, config);
    let profile = SpeedProfile { curvature, speeds };
    if let Some(s) = profile.summary() {
        info!(
            "Speed profile over {} points: min {:.2} m/s, max {:.2} m/s, mean {:.2} m/s, max |curvature| {:.4} 1/m",
            points.len(),
            s.min_speed,
            s.max_speed,
            s.mean_speed,
            s.max_abs_curvature
        );
    }
    profile
}

/// Overwrite the speed of every trajectory point with its profiled speed.
pub fn apply_profile(trajectory: &mut [TrajectoryPoint], config: &ProfileConfig) -> SpeedProfile {
    let points: Vec<(f64, f64)> = trajectory.iter().map(TrajectoryPoint::xy).collect();
    let profile = speed_profile(&points, config);
    for (point, &speed) in trajectory.iter_mut().zip(&profile.speeds) {
        point.speed = speed;
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(radius: f64, n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 0.05;
                (radius * t.cos(), radius * t.sin())
            })
            .collect()
    }

    #[test]
    fn test_gradient_matches_numpy() {
        assert_eq!(gradient(&[1.0, 2.0, 4.0, 7.0]), vec![1.0, 1.5, 2.5, 3.0]);
        assert_eq!(gradient(&[3.0]), vec![0.0]);
        assert!(gradient(&[]).is_empty());
    }

    #[test]
    fn test_straight_path_uniform_speed() {
        let points: Vec<_> = (0..20).map(|i| (i as f64 * 2.0, i as f64)).collect();
        let profile = speed_profile(&points, &ProfileConfig::default());
        assert!(profile.curvature.iter().all(|k| k.abs() < 1e-12));
        assert!(profile.speeds.iter().all(|&s| s == 10.50));
    }

    #[test]
    fn test_circle_curvature() {
        let k = curvature(&circle(20.0, 30), 0.0);
        for value in &k[2..28] {
            assert!((value - 0.05).abs() < 1e-3, "curvature {value}");
        }
        // Clockwise traversal flips the sign
        let mut reversed = circle(20.0, 30);
        reversed.reverse();
        let k = curvature(&reversed, 0.0);
        assert!(k[10] < 0.0);
    }

    #[test]
    fn test_base_speed_table() {
        let config = ProfileConfig::default();
        assert_eq!(config.base_speed(0.0), 10.50);
        assert_eq!(config.base_speed(-0.019), 10.50);
        assert_eq!(config.base_speed(0.02), 10.45);
        assert_eq!(config.base_speed(0.07), 10.20);
        assert_eq!(config.base_speed(0.10), 9.90);
        assert_eq!(config.base_speed(-2.0), 9.90);
    }

    #[test]
    fn test_entry_braking() {
        let mut k = vec![0.0; 12];
        k[5] = 0.05;
        let speeds = speeds_from_curvature(&k, &ProfileConfig::default());
        assert!((speeds[0] - 10.50 * 0.95).abs() < 1e-12);
        assert_eq!(speeds[1], 10.50);
    }

    #[test]
    fn test_exit_acceleration_capped() {
        let mut k = vec![0.0; 12];
        k[0] = 0.2;
        let speeds = speeds_from_curvature(&k, &ProfileConfig::default());
        assert_eq!(speeds[0], 9.90);
        assert_eq!(speeds[5], 10.50);
        assert!(speeds.iter().all(|&s| s <= 10.50));
    }

    #[test]
    fn test_exit_acceleration_below_cap() {
        let config = ProfileConfig {
            max_speed: 20.0,
            ..ProfileConfig::default()
        };
        let mut k = vec![0.0; 12];
        k[0] = 0.2;
        let speeds = speeds_from_curvature(&k, &config);
        assert!((speeds[5] - 10.50 * 1.10).abs() < 1e-12);
    }

    #[test]
    fn test_entry_takes_priority() {
        let mut k = vec![0.0; 11];
        k[0] = 0.2;
        k[10] = 0.3;
        let speeds = speeds_from_curvature(&k, &ProfileConfig::default());
        assert!((speeds[5] - 10.50 * 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_apply_profile_keeps_pose() {
        let mut traj: Vec<TrajectoryPoint> = (0..8)
            .map(|i| TrajectoryPoint::new(i as f64, 0.0, 1.0, 0.0, 3.0))
            .collect();
        let profile = apply_profile(&mut traj, &ProfileConfig::default());
        assert_eq!(profile.speeds.len(), 8);
        for (i, p) in traj.iter().enumerate() {
            assert_eq!((p.x, p.y, p.z), (i as f64, 0.0, 1.0));
            assert!((p.speed - 10.50).abs() < 1e-12);
        }
    }

    #[test]
    fn test_two_point_path() {
        let profile = speed_profile(&[(0.0, 0.0), (0.0, 11.13)], &ProfileConfig::default());
        assert_eq!(profile.curvature, vec![0.0, 0.0]);
        assert_eq!(profile.speeds, vec![10.50, 10.50]);
    }

    #[test]
    fn test_duplicate_points_guarded() {
        let points = vec![(0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        let k = curvature(&points, 0.0);
        assert_eq!(k, vec![0.0, 0.0, 0.0]);

        let eps_config = ProfileConfig {
            min_speed_epsilon: 1e-6,
            ..ProfileConfig::default()
        };
        let k = curvature(&[(0.0, 0.0), (0.0001, 0.0), (0.0002, 0.0001)], eps_config.min_speed_epsilon);
        assert!(k.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_config_from_yaml_partial() {
        let config = ProfileConfig::from_yaml("lookahead: 3\nmax_speed: 12.0\n").unwrap();
        assert_eq!(config.lookahead, 3);
        assert_eq!(config.max_speed, 12.0);
        assert_eq!(config.speed_table, ProfileConfig::default().speed_table);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(ProfileConfig::from_yaml("lookahead: 0\n").is_err());
        assert!(ProfileConfig::from_yaml("unknown_key: 1\n").is_err());
        let unsorted = "speed_table:\n  - {max_curvature: 0.1, speed: 10.0}\n  - {max_curvature: 0.05, speed: 9.0}\n";
        assert!(matches!(
            ProfileConfig::from_yaml(unsorted),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_summary() {
        let profile = SpeedProfile {
            curvature: vec![0.1, f64::NAN, -0.3],
            speeds: vec![9.0, 10.0, 11.0],
        };
        let s = profile.summary().unwrap();
        assert_eq!(s.min_speed, 9.0);
        assert_eq!(s.max_speed, 11.0);
        assert_eq!(s.mean_speed, 10.0);
        assert_eq!(s.max_abs_curvature, 0.3);
        assert!(SpeedProfile {
            curvature: vec![],
            speeds: vec![]
        }
        .summary()
        .is_none());
    }
}
