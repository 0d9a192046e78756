//! Strategy selection from configuration
//!
//! A host picks its interest strategy in a RON file:
//!
//! ```ron
//! SpatialHash(
//!     vis_range: 40.0,
//!     projection: SideViewXY,
//! )
//! ```
//!
//! Omitted parameters take their defaults.

use crate::distance::{self, DistanceInterest};
use crate::matches::MatchInterest;
use crate::scene::SceneInterest;
use crate::spatial::{self, Projection, SpatialHashInterest};
use crate::team::TeamInterest;
use crate::{Error, InterestManagement, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_rebuild_interval() -> f64 {
    1.0
}

fn default_distance_range() -> f32 {
    distance::DEFAULT_VIS_RANGE
}

fn default_spatial_range() -> f32 {
    spatial::DEFAULT_VIS_RANGE
}

/// Which interest strategy to run, with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterestConfig {
    Distance {
        #[serde(default = "default_distance_range")]
        vis_range: f32,
        #[serde(default = "default_rebuild_interval")]
        rebuild_interval: f64,
    },
    SpatialHash {
        #[serde(default = "default_spatial_range")]
        vis_range: f32,
        #[serde(default)]
        projection: Projection,
        #[serde(default = "default_rebuild_interval")]
        rebuild_interval: f64,
    },
    Scene {
        #[serde(default = "default_rebuild_interval")]
        rebuild_interval: f64,
    },
    Team {
        #[serde(default = "default_rebuild_interval")]
        rebuild_interval: f64,
    },
    Match {
        #[serde(default = "default_rebuild_interval")]
        rebuild_interval: f64,
    },
}

impl Default for InterestConfig {
    fn default() -> Self {
        InterestConfig::SpatialHash {
            vis_range: spatial::DEFAULT_VIS_RANGE,
            projection: Projection::default(),
            rebuild_interval: default_rebuild_interval(),
        }
    }
}

impl InterestConfig {
    /// Parse a config from RON text
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: InterestConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a RON file
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    pub fn rebuild_interval(&self) -> f64 {
        match self {
            InterestConfig::Distance {
                rebuild_interval, ..
            }
            | InterestConfig::SpatialHash {
                rebuild_interval, ..
            }
            | InterestConfig::Scene { rebuild_interval }
            | InterestConfig::Team { rebuild_interval }
            | InterestConfig::Match { rebuild_interval } => *rebuild_interval,
        }
    }

    /// Check parameters are in range
    pub fn validate(&self) -> Result<()> {
        let interval = self.rebuild_interval();
        if !interval.is_finite() || interval < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "rebuild_interval must be finite and >= 0, got {}",
                interval
            )));
        }
        if let InterestConfig::Distance { vis_range, .. }
        | InterestConfig::SpatialHash { vis_range, .. } = self
        {
            if !vis_range.is_finite() || *vis_range <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "vis_range must be finite and > 0, got {}",
                    vis_range
                )));
            }
        }
        Ok(())
    }

    /// Validate and instantiate the strategy
    pub fn build(&self) -> Result<Box<dyn InterestManagement>> {
        self.validate()?;
        let strategy: Box<dyn InterestManagement> = match *self {
            InterestConfig::Distance {
                vis_range,
                rebuild_interval,
            } => Box::new(DistanceInterest::new(vis_range, rebuild_interval)),
            InterestConfig::SpatialHash {
                vis_range,
                projection,
                rebuild_interval,
            } => Box::new(SpatialHashInterest::new(
                vis_range,
                projection,
                rebuild_interval,
            )),
            InterestConfig::Scene { rebuild_interval } => {
                Box::new(SceneInterest::new(rebuild_interval))
            }
            InterestConfig::Team { rebuild_interval } => {
                Box::new(TeamInterest::new(rebuild_interval))
            }
            InterestConfig::Match { rebuild_interval } => {
                Box::new(MatchInterest::new(rebuild_interval))
            }
        };
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = InterestConfig::from_ron_str("SpatialHash(projection: SideViewXY)").unwrap();
        assert_eq!(
            config,
            InterestConfig::SpatialHash {
                vis_range: 30.0,
                projection: Projection::SideViewXY,
                rebuild_interval: 1.0,
            }
        );

        let config = InterestConfig::from_ron_str("Distance(vis_range: 12.0)").unwrap();
        assert_eq!(config.rebuild_interval(), 1.0);
    }

    #[test]
    fn test_build_each_strategy() {
        let cases = [
            ("Distance(vis_range: 50.0)", "distance"),
            ("SpatialHash(vis_range: 20.0)", "spatial_hash"),
            ("Scene(rebuild_interval: 1.0)", "scene"),
            ("Team(rebuild_interval: 0.5)", "team"),
            ("Match(rebuild_interval: 2.0)", "match"),
        ];
        for (text, name) in cases {
            let strategy = InterestConfig::from_ron_str(text).unwrap().build().unwrap();
            assert_eq!(strategy.name(), name);
        }
    }

    #[test]
    fn test_rejects_invalid() {
        let err = InterestConfig::from_ron_str("Distance(vis_range: 0.0)").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = InterestConfig::Match {
            rebuild_interval: -1.0,
        }
        .build()
        .err();
        assert!(matches!(err, Some(Error::InvalidConfig(_))));

        let err = InterestConfig::from_ron_str("Teleport(rebuild_interval: 1.0)").unwrap_err();
        assert!(matches!(err, Error::Ron(_)));
    }
}
