use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. `"catalog.manage"`). `"*"` allows everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission(Cow::Borrowed("*"));
    pub const CATALOG_MANAGE: Permission = Permission(Cow::Borrowed("catalog.manage"));
    pub const ORDERS_MANAGE: Permission = Permission(Cow::Borrowed("orders.manage"));
    pub const PROMOTIONS_MANAGE: Permission = Permission(Cow::Borrowed("promotions.manage"));
    pub const SUPPORT_MANAGE: Permission = Permission(Cow::Borrowed("support.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
