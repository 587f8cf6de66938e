use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
    Unknown(String),
}

impl FromStr for Role {
    type Err = Infallible;

    // Perimeter tokens are case-sensitive; anything else is carried through as Unknown.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ROLE_USER" | "USER" => Role::User,
            "ROLE_ADMIN" | "ADMIN" => Role::Admin,
            other => Role::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("ROLE_USER"),
            Role::Admin => f.write_str("ROLE_ADMIN"),
            Role::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Roles attached to a request by the perimeter, parsed from a comma-joined header value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut out = Vec::new();
        for role in roles {
            if !out.contains(&role) {
                out.push(role);
            }
        }
        Self(out)
    }

    /// `None` and blank input both yield the empty set.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else { return Self::default(); };
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| match s.parse::<Role>() {
                    Ok(role) => role,
                    Err(never) => match never {},
                }),
        )
    }

    pub fn contains(&self, role: &Role) -> bool { self.0.iter().any(|r| r == role) }

    pub fn is_admin(&self) -> bool { self.contains(&Role::Admin) }

    /// Holds at least one role the payment API recognises.
    pub fn has_payment_role(&self) -> bool { self.contains(&Role::User) || self.is_admin() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Role> { self.0.iter() }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_joined_roles() {
        let set = RoleSet::parse(Some("ROLE_USER, ROLE_ADMIN"));
        assert!(set.contains(&Role::User));
        assert!(set.is_admin());
    }

    #[test]
    fn missing_or_blank_is_empty() {
        assert!(RoleSet::parse(None).is_empty());
        assert!(RoleSet::parse(Some("  ")).is_empty());
        assert!(RoleSet::parse(Some(",,")).is_empty());
    }

    #[test]
    fn matching_is_exact_not_substring() {
        // "ROLE_ADMINISTRATOR" would have passed a substring check for ROLE_ADMIN.
        let set = RoleSet::parse(Some("ROLE_ADMINISTRATOR,role_user"));
        assert!(!set.is_admin());
        assert!(!set.has_payment_role());
    }

    #[test]
    fn duplicates_collapse() {
        let set = RoleSet::parse(Some("ROLE_USER,ROLE_USER"));
        assert_eq!(set.iter().count(), 1);
        assert_eq!(set.to_string(), "ROLE_USER");
    }
}
