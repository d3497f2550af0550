use commerce_auth::{Principal, Role};
use commerce_cart::Owner;
use commerce_core::{SessionKey, UserId};

/// Who is calling: an authenticated user, a guest session, both (right
/// after login, before the carts are merged) or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    principal: Option<Principal>,
    session: Option<SessionKey>,
}

impl RequestIdentity {
    pub fn new(principal: Option<Principal>, session: Option<SessionKey>) -> Self {
        Self { principal, session }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.principal.as_ref().map(|p| p.user_id)
    }

    pub fn session(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    pub fn roles(&self) -> &[Role] {
        self.principal.as_ref().map(|p| p.roles.as_slice()).unwrap_or(&[])
    }

    /// Cart and order owner: the user when signed in, else the guest session.
    pub fn owner(&self) -> Option<Owner> {
        match (&self.principal, &self.session) {
            (Some(p), _) => Some(Owner::User(p.user_id)),
            (None, Some(session)) => Some(Owner::Session(session.clone())),
            (None, None) => None,
        }
    }
}
