use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::BuildOptions;
use crate::template::TemplaterConfig;

/// Engine-wide settings; every field has a default so partial files load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub templates: TemplaterConfig,
    pub build: BuildOptions,
}
