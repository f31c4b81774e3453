//! Authenticated caller identity handed to the lifecycle services
use super::error::LedgerError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
    pub fn can_approve_invoices(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    // matches the role strings kept on user profiles
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super-admin" => Ok(Role::SuperAdmin),
            other => Err(LedgerError::InvalidInput(format!("unknown role {other:?}"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_roles() {
        assert_eq!("super-admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("".parse::<Role>().is_err());
        assert!("Super-Admin".parse::<Role>().is_err());
    }

    #[test]
    fn only_super_admin_approves() {
        assert!(Caller::new("u1", Role::SuperAdmin).can_approve_invoices());
        assert!(!Caller::new("u2", Role::Admin).can_approve_invoices());
    }
}
