use serde::{Deserialize, Serialize};

use bank_core::{Entity, LedgerError, OwnerId};

/// Holder of one or more accounts. Immutable once created.
///
/// Owners are looked up by full name when an account is opened; two distinct
/// people with the same name therefore resolve to the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub full_name: String,
    pub citizenship: String,
}

impl Entity for Owner {
    type Id = OwnerId;

    fn id(&self) -> OwnerId {
        self.id
    }
}

/// Validated input for creating an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOwner {
    full_name: String,
    citizenship: String,
}

impl NewOwner {
    pub fn new(full_name: &str, citizenship: &str) -> Result<Self, LedgerError> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(LedgerError::validation("full name is required"));
        }

        let citizenship = citizenship.trim();
        if citizenship.is_empty() {
            return Err(LedgerError::validation("citizenship is required"));
        }

        Ok(Self {
            full_name: full_name.to_string(),
            citizenship: citizenship.to_string(),
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn citizenship(&self) -> &str {
        &self.citizenship
    }

    pub fn into_owner(self, id: OwnerId) -> Owner {
        Owner {
            id,
            full_name: self.full_name,
            citizenship: self.citizenship,
        }
    }
}
