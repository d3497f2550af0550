use std::collections::HashSet;

use thiserror::Error;

use commerce_core::UserId;

use crate::{JwtClaims, Permission, Role};

/// An authenticated user with resolved permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.clone(),
            permissions: permissions_for_roles(&claims.roles),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: does the principal hold `required` (or `*`)?
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id, permission = %required, "authorization denied");
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Static role→permission mapping. `admin` grants everything; `support`
/// manages complaints; customers get no management permissions.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.contains(&Role::ADMIN) {
        return vec![Permission::ALL];
    }

    let mut perms = Vec::new();
    if roles.contains(&Role::SUPPORT_AGENT) {
        perms.push(Permission::SUPPORT_MANAGE);
    }
    perms
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn principal(roles: Vec<Role>) -> Principal {
        let now = Utc::now();
        Principal::from_claims(&JwtClaims {
            sub: UserId::new(),
            roles,
            issued_at: now,
            expires_at: now + Duration::minutes(5),
        })
    }

    #[test]
    fn admin_may_do_anything() {
        let admin = principal(vec![Role::ADMIN]);
        assert!(authorize(&admin, &Permission::CATALOG_MANAGE).is_ok());
        assert!(authorize(&admin, &Permission::new("anything.else")).is_ok());
    }

    #[test]
    fn customer_has_no_management_permissions() {
        let customer = principal(vec![Role::CUSTOMER]);
        assert_eq!(
            authorize(&customer, &Permission::ORDERS_MANAGE),
            Err(AuthzError::Forbidden("orders.manage".into()))
        );
    }

    #[test]
    fn support_agents_manage_complaints_only() {
        let agent = principal(vec![Role::SUPPORT_AGENT]);
        assert!(authorize(&agent, &Permission::SUPPORT_MANAGE).is_ok());
        assert!(authorize(&agent, &Permission::PROMOTIONS_MANAGE).is_err());
    }
}
