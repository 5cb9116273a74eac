//! Tenant context: the isolation boundary for all flow access.
//!
//! Every state-touching operation takes an explicit tenant context; nothing
//! is inferred from ambient state. A context with an empty identifier is
//! rejected before any lookup or mutation.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// A client account plus engagement pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub client_account_id: String,
    pub engagement_id: String,
}

impl TenantContext {
    pub fn new(
        client_account_id: impl Into<String>,
        engagement_id: impl Into<String>,
    ) -> Self {
        TenantContext {
            client_account_id: client_account_id.into(),
            engagement_id: engagement_id.into(),
        }
    }

    /// Reject missing tenant identifiers.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.client_account_id.trim().is_empty() {
            return Err(FlowError::InvalidTenantContext {
                reason: "client_account_id is empty".into(),
            });
        }
        if self.engagement_id.trim().is_empty() {
            return Err(FlowError::InvalidTenantContext {
                reason: "engagement_id is empty".into(),
            });
        }
        Ok(())
    }

    /// Reject access to a record owned by a different tenant.
    pub fn check_matches(&self, owner: &TenantContext) -> Result<(), FlowError> {
        if self != owner {
            return Err(FlowError::InvalidTenantContext {
                reason: format!(
                    "tenant {}/{} does not own this flow",
                    self.client_account_id, self.engagement_id
                ),
            });
        }
        Ok(())
    }
}
