use serde::{Deserialize, Serialize};

/// Serializer settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmiConfig {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Write recorded `xmi:id`s back out.
    pub emit_xmi_ids: bool,
    /// Value of the `xmi:version` attribute.
    pub xmi_version: String,
}

impl Default for XmiConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            emit_xmi_ids: true,
            xmi_version: "2.0".to_string(),
        }
    }
}
