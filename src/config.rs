// src/config.rs

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine_lib::spawner::SpawnerConfig;
use crate::engine_lib::trigger::TriggerConfig;
use crate::engine_lib::world_switch::CoordinatorConfig;
use crate::error::{PortalError, PortalResult};
use crate::rendering_lib::portal_rig::RigConfig;

/// Every recognised portal option. Missing sections fall back to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub trigger: TriggerConfig,
    pub rig: RigConfig,
    pub spawner: SpawnerConfig,
    pub coordinator: CoordinatorConfig,
}

impl PortalConfig {
    pub fn from_ron_str(content: &str) -> PortalResult<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> PortalResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PortalError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&content)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => {
                log::info!("Loaded portal config from {}", path.as_ref().display());
                config
            }
            Err(err) => {
                log::warn!("{}; using default portal config", err);
                Self::default()
            }
        }
    }

    pub fn to_ron_string(&self) -> PortalResult<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}
