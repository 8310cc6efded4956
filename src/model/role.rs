use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    SuperAdmin = 1,
    Admin = 2,
    Hr = 3,
    Finance = 4,
    Employee = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::SuperAdmin),
            2 => Some(Role::Admin),
            3 => Some(Role::Hr),
            4 => Some(Role::Finance),
            5 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn can_generate_payroll(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Hr | Role::Admin)
    }

    pub fn can_approve_payroll(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    pub fn can_mark_paid(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Finance | Role::Admin)
    }

    pub fn can_lock_month(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    pub fn can_unlock_month(self) -> bool {
        self == Role::SuperAdmin
    }

    pub fn can_manage_structures(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Hr | Role::Admin)
    }

    /// Roles that may read payroll rows belonging to other users.
    pub fn can_view_payroll(self) -> bool {
        self != Role::Employee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn id_round_trips_for_every_role() {
        for role in Role::iter() {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(6), None);
    }

    #[test]
    fn parses_snake_case_names() {
        assert_eq!(Role::from_str("super_admin").ok(), Some(Role::SuperAdmin));
        assert_eq!(Role::Finance.to_string(), "finance");
    }

    #[rstest]
    #[case(Role::SuperAdmin, true, true, true, true, true, true, true)]
    #[case(Role::Admin, true, true, true, true, false, true, true)]
    #[case(Role::Hr, true, false, false, false, false, true, true)]
    #[case(Role::Finance, false, false, true, false, false, false, true)]
    #[case(Role::Employee, false, false, false, false, false, false, false)]
    #[allow(clippy::too_many_arguments)]
    fn permission_gates(
        #[case] role: Role,
        #[case] generate: bool,
        #[case] approve: bool,
        #[case] pay: bool,
        #[case] lock: bool,
        #[case] unlock: bool,
        #[case] structures: bool,
        #[case] view: bool,
    ) {
        assert_eq!(role.can_generate_payroll(), generate);
        assert_eq!(role.can_approve_payroll(), approve);
        assert_eq!(role.can_mark_paid(), pay);
        assert_eq!(role.can_lock_month(), lock);
        assert_eq!(role.can_unlock_month(), unlock);
        assert_eq!(role.can_manage_structures(), structures);
        assert_eq!(role.can_view_payroll(), view);
    }
}
