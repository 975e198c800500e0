//! Configuration loading and validation

use anyhow::{Context, Result};
use planmark_core::{parse_pose_string, FrameTree};
use planmark_scene::StaticTransforms;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default, rename = "frame")]
    pub frames: Vec<FrameConfig>,
    #[serde(default, rename = "namespace")]
    pub namespaces: Vec<NamespaceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Frame the viewer renders relative to
    #[serde(default = "default_frame")]
    pub fixed_frame: String,
    /// Upper bound for one transform lookup
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_ms: u64,
    /// Show the marker host at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fixed_frame: default_frame(),
            lookup_timeout_ms: default_lookup_timeout(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Canonical frame markers are reconciled into
    #[serde(default = "default_frame")]
    pub planning_frame: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            planning_frame: default_frame(),
        }
    }
}

fn default_frame() -> String {
    "map".to_string()
}

fn default_lookup_timeout() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    pub name: String,
    /// Parent frame (defaults to the planning frame)
    #[serde(default)]
    pub parent: Option<String>,
    /// Pose in the parent: "x y z roll pitch yaw" (meters, radians)
    #[serde(default)]
    pub pose: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl Config {
    /// Build the frame snapshot described by `[scene]` and `[[frame]]`
    pub fn frame_tree(&self) -> Result<FrameTree> {
        let mut tree = FrameTree::new(&self.scene.planning_frame);
        for frame in &self.frames {
            let pose = match &frame.pose {
                Some(s) => parse_pose_string(s)
                    .with_context(|| format!("Invalid pose for frame '{}'", frame.name))?,
                None => Default::default(),
            };
            let parent = frame.parent.as_deref().unwrap_or(&self.scene.planning_frame);
            tree.add_frame(&frame.name, parent, pose)
                .with_context(|| format!("Invalid frame '{}'", frame.name))?;
        }
        Ok(tree)
    }

    /// Transform service for the display over `tree`
    pub fn transforms(&self, tree: FrameTree) -> StaticTransforms {
        StaticTransforms::new(tree, &self.display.fixed_frame)
            .with_timeout(Duration::from_millis(self.display.lookup_timeout_ms))
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save an example configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        display: DisplayConfig {
            fixed_frame: "odom".to_string(),
            ..DisplayConfig::default()
        },
        scene: SceneConfig::default(),
        frames: vec![
            FrameConfig {
                name: "odom".to_string(),
                parent: None,
                pose: Some("0 0 0 0 0 0".to_string()),
            },
            FrameConfig {
                name: "base_link".to_string(),
                parent: Some("odom".to_string()),
                pose: Some("1.0 0.5 0 0 0 1.5708".to_string()),
            },
        ],
        namespaces: vec![NamespaceConfig {
            name: "collision".to_string(),
            visible: false,
        }],
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
