use serde::{Deserialize, Serialize};

use crate::uri::DEFAULT_MAX_REWRITES;

/// Configuration for a [`ResourceSet`](crate::ResourceSet).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSetConfig {
    /// Maximum rewrite steps applied by `convert_uri` before giving up.
    pub max_uri_rewrites: usize,
}

impl Default for ResourceSetConfig {
    fn default() -> Self {
        Self {
            max_uri_rewrites: DEFAULT_MAX_REWRITES,
        }
    }
}
