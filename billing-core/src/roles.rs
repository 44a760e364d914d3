//! Roles, departments and the panels each combination may open.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    /// Unknown roles fall back to `Staff`, the least privileged.
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "super_admin" | "superadmin" => Role::SuperAdmin,
            "admin" => Role::Admin,
            _ => Role::Staff,
        }
    }

    /// Whether writes go straight to the backend. Everyone else goes
    /// through a permission request.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    pub fn can_review_requests(&self) -> bool {
        self.can_write()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Accounts,
    Hr,
    Marketing,
    Purchase,
    General,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Accounts => "accounts",
            Department::Hr => "hr",
            Department::Marketing => "marketing",
            Department::Purchase => "purchase",
            Department::General => "general",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "accounts" | "account" | "finance" => Department::Accounts,
            "hr" | "human resources" => Department::Hr,
            "marketing" | "sales" => Department::Marketing,
            "purchase" | "purchasing" | "procurement" => Department::Purchase,
            _ => Department::General,
        }
    }
}

/// Areas of the desk a user can open from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Billing,
    Customers,
    Accounts,
    Hr,
    Marketing,
    Purchase,
    PermissionRequests,
    Settings,
}

impl Panel {
    pub fn title(&self) -> &'static str {
        match self {
            Panel::Billing => "Bills & Debit Notes",
            Panel::Customers => "Customers",
            Panel::Accounts => "Accounts",
            Panel::Hr => "HR",
            Panel::Marketing => "Marketing",
            Panel::Purchase => "Purchase",
            Panel::PermissionRequests => "Permission Requests",
            Panel::Settings => "Settings",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Panel::Billing => "/credit-bills",
            Panel::Customers => "/customers",
            Panel::Accounts => "/panels/accounts",
            Panel::Hr => "/panels/hr",
            Panel::Marketing => "/panels/marketing",
            Panel::Purchase => "/panels/purchase",
            Panel::PermissionRequests => "/permission-requests",
            Panel::Settings => "/panels/settings",
        }
    }

    fn for_department(department: Department) -> Option<Panel> {
        match department {
            Department::Accounts => Some(Panel::Accounts),
            Department::Hr => Some(Panel::Hr),
            Department::Marketing => Some(Panel::Marketing),
            Department::Purchase => Some(Panel::Purchase),
            Department::General => None,
        }
    }
}

/// Panels visible to `role` working in `department`, in display order.
pub fn panels_for(role: Role, department: Department) -> Vec<Panel> {
    match role {
        Role::SuperAdmin => vec![
            Panel::Billing,
            Panel::Customers,
            Panel::Accounts,
            Panel::Hr,
            Panel::Marketing,
            Panel::Purchase,
            Panel::PermissionRequests,
            Panel::Settings,
        ],
        Role::Admin => {
            let mut panels = vec![Panel::Billing, Panel::Customers];
            panels.extend(Panel::for_department(department));
            panels.push(Panel::PermissionRequests);
            panels
        }
        Role::Staff => {
            let mut panels = vec![Panel::Billing];
            if matches!(department, Department::Accounts | Department::Marketing) {
                panels.push(Panel::Customers);
            }
            panels
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_defaults_to_least_privilege() {
        assert_eq!(Role::from_string("Super-Admin"), Role::SuperAdmin);
        assert_eq!(Role::from_string("ADMIN"), Role::Admin);
        assert_eq!(Role::from_string("intern"), Role::Staff);
        assert!(!Role::Staff.can_write());
        assert!(Role::Admin.can_write());
    }

    #[test]
    fn admins_see_their_department_panel() {
        let panels = panels_for(Role::Admin, Department::Hr);
        assert!(panels.contains(&Panel::Hr));
        assert!(!panels.contains(&Panel::Accounts));
        assert!(!panels.contains(&Panel::Settings));
    }

    #[test]
    fn staff_never_see_request_review() {
        for department in [
            Department::Accounts,
            Department::Hr,
            Department::Marketing,
            Department::Purchase,
            Department::General,
        ] {
            let panels = panels_for(Role::Staff, department);
            assert!(panels.contains(&Panel::Billing));
            assert!(!panels.contains(&Panel::PermissionRequests));
        }
    }

    #[test]
    fn super_admin_sees_everything() {
        assert_eq!(panels_for(Role::SuperAdmin, Department::General).len(), 8);
    }
}
