use serde::{Deserialize, Serialize};

use commerce_core::{SessionKey, UserId};

/// Who a cart (or an order) belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    User(UserId),
    Session(SessionKey),
}

impl Owner {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Session(_) => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Owner::Session(_))
    }
}

impl core::fmt::Display for Owner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Owner::User(id) => write!(f, "user:{id}"),
            Owner::Session(key) => write!(f, "session:{key}"),
        }
    }
}
