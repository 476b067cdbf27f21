use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Roles are a flat, multi-valued tag set: a user may be both an officer
/// and a staff member. Capability checks go through [`has_any`], not a
/// hierarchy.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Officer,
    Staff,
    Faculty,
    Professor,
}

/// Roles for which lateness is evaluated at check-in.
pub const STAFF_CLASS: [Role; 3] = [Role::Admin, Role::Officer, Role::Staff];

pub fn has_any(roles: &[Role], required: &[Role]) -> bool {
    roles.iter().any(|r| required.contains(r))
}

/// Staff-class users can be marked late; faculty-class users never are.
pub fn is_staff_class(roles: &[Role]) -> bool {
    has_any(roles, &STAFF_CLASS)
}

pub fn is_faculty_class(roles: &[Role]) -> bool {
    has_any(roles, &[Role::Faculty, Role::Professor])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_as_lowercase() {
        assert_eq!(Role::Officer.to_string(), "officer");
        assert_eq!(Role::from_str("faculty").unwrap(), Role::Faculty);
        assert!(Role::from_str("warden").is_err());
    }

    #[test]
    fn staff_class_membership() {
        assert!(is_staff_class(&[Role::Staff]));
        assert!(is_staff_class(&[Role::Officer, Role::Faculty]));
        assert!(!is_staff_class(&[Role::Professor]));
        assert!(is_faculty_class(&[Role::Faculty, Role::Staff]));
    }

    #[test]
    fn has_any_on_empty_set() {
        assert!(!has_any(&[], &STAFF_CLASS));
    }
}
