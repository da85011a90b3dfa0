use serde::{Deserialize, Serialize};

/// Name of the `modules.<name>` section read by the module.
pub const MODULE_NAME: &str = "accounts";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountsConfig {
    /// Prefix under which every resource type is mounted.
    pub base_path: String,
    /// Default users page size.
    pub page_size: usize,
    pub max_page_size: usize,
    pub max_name_length: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            base_path: "/api/v1".to_string(),
            page_size: 20,
            max_page_size: 100,
            max_name_length: 100,
        }
    }
}
