//! Roles, acting users and the access scope derived from them

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Role string carried by every authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Field-level operative, sees and moves only their own stock
    FieldAssistant,
    /// Area manager with full visibility
    AreaManager,
    /// Any other role string
    Unrecognized(String),
}

impl Role {
    pub const FIELD_ASSISTANT: &'static str = "Field Assistant";
    pub const AREA_MANAGER: &'static str = "Assistant Area Manager";

    /// Parse a role string; never fails, unknown values are kept verbatim
    pub fn parse(raw: &str) -> Self {
        match raw {
            Self::FIELD_ASSISTANT => Role::FieldAssistant,
            Self::AREA_MANAGER => Role::AreaManager,
            other => Role::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::FieldAssistant => Self::FIELD_ASSISTANT,
            Role::AreaManager => Self::AREA_MANAGER,
            Role::Unrecognized(raw) => raw,
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Role::FieldAssistant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

/// Which ledger rows an aggregation may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum AccessScope {
    /// Only rows attributed to this user
    Restricted(Uuid),
    /// Every user's rows
    Global,
}

impl AccessScope {
    /// User id to filter on, `None` for the global scope
    pub fn user_filter(&self) -> Option<Uuid> {
        match self {
            AccessScope::Restricted(user_id) => Some(*user_id),
            AccessScope::Global => None,
        }
    }

    pub fn admits(&self, user_id: Uuid) -> bool {
        match self {
            AccessScope::Restricted(owner) => *owner == user_id,
            AccessScope::Global => true,
        }
    }
}

/// The authenticated user on whose behalf the ledger is read or written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Scope used for dashboards and listings.
    ///
    /// Unrecognized roles read globally, matching the area manager.
    pub fn read_scope(&self) -> AccessScope {
        if self.role.is_restricted() {
            AccessScope::Restricted(self.user_id)
        } else {
            AccessScope::Global
        }
    }

    /// Gate for any ledger mutation. Unrecognized roles may not write.
    pub fn ensure_can_write(&self) -> Result<(), LedgerError> {
        match self.role {
            Role::FieldAssistant | Role::AreaManager => Ok(()),
            Role::Unrecognized(ref raw) => Err(LedgerError::forbidden(format!(
                "Role '{}' may not record stock movements",
                raw
            ))),
        }
    }

    /// Restricted actors may only touch rows they own
    pub fn ensure_owns(&self, owner_id: Uuid) -> Result<(), LedgerError> {
        if self.role.is_restricted() && owner_id != self.user_id {
            return Err(LedgerError::forbidden(
                "You do not have permission to access this record",
            ));
        }
        Ok(())
    }

    /// Scope for a movement attributed to `target_user`.
    ///
    /// Restricted actors must be the target; the sufficiency check then only
    /// sees their own rows.
    pub fn write_scope(&self, target_user: Uuid) -> Result<AccessScope, LedgerError> {
        self.ensure_can_write()?;
        if self.role.is_restricted() {
            if target_user != self.user_id {
                return Err(LedgerError::forbidden(
                    "You may not record stock movements for another user",
                ));
            }
            return Ok(AccessScope::Restricted(self.user_id));
        }
        Ok(AccessScope::Global)
    }

    pub fn is_manager(&self) -> bool {
        matches!(self.role, Role::AreaManager)
    }
}
