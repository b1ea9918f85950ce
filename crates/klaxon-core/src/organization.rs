use serde::{Deserialize, Serialize};

use crate::ids::OrganizationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    pub organization_id: OrganizationId,
    /// Whether urgent escalation targets may bypass a user's quiet hours.
    pub allow_urgent_dnd_bypass: bool,
}

impl OrganizationSettings {
    pub fn defaults_for(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            allow_urgent_dnd_bypass: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_bypass_is_allowed_by_default() {
        assert!(OrganizationSettings::defaults_for(OrganizationId::new()).allow_urgent_dnd_bypass);
    }
}
