use serde::{Deserialize, Serialize};

use super::enums::AlertSeverity;

/// Drug-interaction finding returned by the external check. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionAlert {
    pub severity: AlertSeverity,
    pub drugs: Vec<String>,
    pub description: String,
    pub recommendation: String,
}
