use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum!(
    Role, "role", {
        Student => "student",
        Landlord => "landlord",
        Admin => "admin",
    }
);

/// Name and address used when writing to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Gateway sub-account a landlord's share is settled into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutAccount {
    pub landlord_id: Uuid,
    pub subaccount_code: String,
    pub bank_code: String,
    pub account_number: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require(&self, role: Role) -> Result<(), crate::CoreError> {
        if self.role != role {
            return Err(crate::CoreError::Forbidden(format!("Only a {} can do this", role)));
        }
        Ok(())
    }
}
