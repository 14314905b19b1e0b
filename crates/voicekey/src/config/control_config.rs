use crate::config::default_base_name;

use serde::{Deserialize, Serialize};

/// Cross-process control plane configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Well-known base name the exclusivity token and signals derive from.
    /// Independently launched processes must agree on it.
    #[serde(default = "default_base_name")]
    pub base_name: String,
}
