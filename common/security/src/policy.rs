use std::fmt;

use tracing::warn;

use crate::{AccessDenied, Principal};

/// Caller-initiated operations the policy is consulted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Perform,
    Get,
    Report,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Perform => "perform",
            Action::Get => "get",
            Action::Report => "report on",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny(AccessDenied),
}

impl Decision {
    pub fn is_permit(&self) -> bool { matches!(self, Decision::Permit) }

    pub fn into_result(self) -> Result<(), AccessDenied> {
        match self {
            Decision::Permit => Ok(()),
            Decision::Deny(e) => Err(e),
        }
    }
}

fn denied(action: Action) -> AccessDenied {
    AccessDenied::new(format!("You are not authorized to {action} this payment!"))
}

/// Rules in order: a payment role is required; ADMIN bypasses ownership; otherwise the
/// target owner must be the caller.
pub fn decide(target_owner_id: &str, principal: &Principal, action: Action) -> Decision {
    if !principal.roles.has_payment_role() {
        return Decision::Deny(denied(action));
    }
    if principal.roles.is_admin() || target_owner_id == principal.user_id {
        return Decision::Permit;
    }
    Decision::Deny(denied(action))
}

pub fn authorize(target_owner_id: &str, principal: &Principal, action: Action) -> Result<(), AccessDenied> {
    let decision = decide(target_owner_id, principal, action);
    if let Decision::Deny(ref e) = decision {
        warn!(user_id = %principal.user_id, roles = %principal.roles, %action, reason = %e, "payment_access_denied");
    }
    decision.into_result()
}

/// All-or-nothing check over a result set: one foreign owner denies the whole request.
pub fn authorize_all<'a, I>(owner_ids: I, principal: &Principal) -> Result<(), AccessDenied>
where
    I: IntoIterator<Item = &'a str>,
{
    let deny = || {
        warn!(user_id = %principal.user_id, roles = %principal.roles, "payment_collection_access_denied");
        AccessDenied::new("You are not authorized to access these payments!")
    };
    if !principal.roles.has_payment_role() {
        return Err(deny());
    }
    if principal.roles.is_admin() {
        return Ok(());
    }
    if owner_ids.into_iter().any(|owner| owner != principal.user_id) {
        return Err(deny());
    }
    Ok(())
}

pub fn require_admin(principal: &Principal, action: Action) -> Result<(), AccessDenied> {
    if principal.roles.is_admin() {
        return Ok(());
    }
    warn!(user_id = %principal.user_id, roles = %principal.roles, %action, "admin_role_check_failed");
    Err(denied(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoleSet;

    fn principal(id: &str, roles: &str) -> Principal {
        Principal::new(id, RoleSet::parse(Some(roles)))
    }

    #[test]
    fn user_can_act_on_own_payment() {
        assert!(decide("U1", &principal("U1", "ROLE_USER"), Action::Perform).is_permit());
    }

    #[test]
    fn user_denied_on_foreign_payment() {
        let d = decide("U2", &principal("U1", "ROLE_USER"), Action::Get);
        assert_eq!(d, Decision::Deny(AccessDenied::new("You are not authorized to get this payment!")));
    }

    #[test]
    fn admin_bypasses_ownership() {
        assert!(decide("U2", &principal("A1", "ROLE_ADMIN"), Action::Perform).is_permit());
    }

    #[test]
    fn no_payment_role_denies_even_for_owner() {
        let err = authorize("U1", &principal("U1", "ROLE_GUEST"), Action::Perform).unwrap_err();
        assert_eq!(err.message, "You are not authorized to perform this payment!");
        assert!(authorize("U1", &Principal::new("U1", RoleSet::parse(None)), Action::Get).is_err());
    }

    #[test]
    fn collection_denies_on_any_foreign_owner() {
        let p = principal("U1", "ROLE_USER");
        assert!(authorize_all(["U1", "U1"], &p).is_ok());
        let err = authorize_all(["U1", "U9"], &p).unwrap_err();
        assert_eq!(err.message, "You are not authorized to access these payments!");
        assert!(authorize_all(["U9"], &principal("A1", "ROLE_ADMIN")).is_ok());
    }

    #[test]
    fn report_requires_admin() {
        assert!(require_admin(&principal("U1", "ROLE_USER"), Action::Report).is_err());
        assert!(require_admin(&principal("A1", "ROLE_USER,ROLE_ADMIN"), Action::Report).is_ok());
    }
}
