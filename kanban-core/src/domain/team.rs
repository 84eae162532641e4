//! Team Entity
//!
//! Access-control grouping tied 1:1 to a project (team id = project id).
//! Members carry independent permission flags; the role only seeds them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::column::DEFAULT_COLUMN_TITLES;
use super::entity::{generate_id, Entity};

/// Synthetic admin created with every default team.
/// Not tied to any signed-in user.
pub const DEFAULT_ADMIN_ID: &str = "local-admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Manager,
    #[default]
    Member,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    CreateTask,
    EditTask,
    DeleteTask,
    MoveTask,
    ManageTeam,
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionAction::CreateTask => "create tasks",
            PermissionAction::EditTask => "edit tasks",
            PermissionAction::DeleteTask => "delete tasks",
            PermissionAction::MoveTask => "move tasks",
            PermissionAction::ManageTeam => "manage the team",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_create_task: bool,
    pub can_edit_task: bool,
    pub can_delete_task: bool,
    pub can_move_task: bool,
    pub can_manage_team: bool,
}

impl Permissions {
    pub fn full() -> Self {
        Self {
            can_create_task: true,
            can_edit_task: true,
            can_delete_task: true,
            can_move_task: true,
            can_manage_team: true,
        }
    }

    /// Seed flags for a freshly added member
    pub fn for_role(role: MemberRole) -> Self {
        match role {
            MemberRole::Admin => Self::full(),
            MemberRole::Manager => Self {
                can_delete_task: false,
                ..Self::full()
            },
            MemberRole::Member => Self {
                can_create_task: true,
                can_edit_task: true,
                can_move_task: true,
                ..Self::default()
            },
            MemberRole::Viewer => Self::default(),
        }
    }

    pub fn allows(&self, action: PermissionAction) -> bool {
        match action {
            PermissionAction::CreateTask => self.can_create_task,
            PermissionAction::EditTask => self.can_edit_task,
            PermissionAction::DeleteTask => self.can_delete_task,
            PermissionAction::MoveTask => self.can_move_task,
            PermissionAction::ManageTeam => self.can_manage_team,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub permissions: Permissions,
}

impl TeamMember {
    pub fn new(name: String, email: String, role: MemberRole) -> Self {
        Self {
            id: generate_id(),
            name,
            email,
            role,
            permissions: Permissions::for_role(role),
        }
    }
}

/// Input for `TeamStore::add_member`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Same as the project id
    pub id: String,
    pub name: String,
    pub description: String,
    pub members: Vec<TeamMember>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Column titles used when the project's board is initialised
    pub custom_columns: Vec<String>,
}

impl Team {
    pub fn new(project_id: String, name: String, description: String, creator: TeamMember) -> Self {
        Self {
            id: project_id,
            name,
            description,
            created_by: creator.id.clone(),
            members: vec![creator],
            created_at: Utc::now(),
            custom_columns: DEFAULT_COLUMN_TITLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Team provisioned the first time a project's board is opened
    pub fn default_for_project(project_id: &str, project_name: &str) -> Self {
        let admin = TeamMember {
            id: DEFAULT_ADMIN_ID.to_string(),
            name: "Admin".to_string(),
            email: "admin@local".to_string(),
            role: MemberRole::Admin,
            permissions: Permissions::full(),
        };
        Self::new(
            project_id.to_string(),
            format!("{} Team", project_name),
            String::new(),
            admin,
        )
    }

    pub fn member(&self, member_id: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut TeamMember> {
        self.members.iter_mut().find(|m| m.id == member_id)
    }

    /// Unknown members are denied
    pub fn can(&self, member_id: &str, action: PermissionAction) -> bool {
        self.member(member_id)
            .map(|m| m.permissions.allows(action))
            .unwrap_or(false)
    }

    pub fn has_manager(&self) -> bool {
        self.members.iter().any(|m| m.permissions.can_manage_team)
    }
}

impl Entity for Team {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Partial update for team metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub custom_columns: Option<Vec<String>>,
}

/// Permission lookup over an optional team, denying when it is missing
pub fn can_perform(team: Option<&Team>, member_id: &str, action: PermissionAction) -> bool {
    team.map(|t| t.can(member_id, action)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_seeds() {
        assert_eq!(Permissions::for_role(MemberRole::Admin), Permissions::full());

        let manager = Permissions::for_role(MemberRole::Manager);
        assert!(manager.can_manage_team);
        assert!(!manager.can_delete_task);

        let member = Permissions::for_role(MemberRole::Member);
        assert!(member.can_move_task);
        assert!(!member.can_manage_team);
        assert!(!member.can_delete_task);

        let viewer = Permissions::for_role(MemberRole::Viewer);
        assert_eq!(viewer, Permissions::default());
    }

    #[test]
    fn test_default_team_has_admin() {
        let team = Team::default_for_project("p1", "Warehouse");
        assert_eq!(team.id, "p1");
        assert_eq!(team.name, "Warehouse Team");
        assert_eq!(team.created_by, DEFAULT_ADMIN_ID);
        assert_eq!(team.custom_columns, vec!["To Do", "In Progress", "Done"]);
        assert!(team.can(DEFAULT_ADMIN_ID, PermissionAction::ManageTeam));
    }

    #[test]
    fn test_permissions_can_diverge_from_role() {
        let mut team = Team::default_for_project("p1", "Warehouse");
        let mut member = TeamMember::new("Ana".to_string(), "ana@example.com".to_string(), MemberRole::Member);
        member.permissions.can_move_task = false;
        let id = member.id.clone();
        team.members.push(member);

        assert!(team.can(&id, PermissionAction::EditTask));
        assert!(!team.can(&id, PermissionAction::MoveTask));
    }

    #[test]
    fn test_fail_closed() {
        let team = Team::default_for_project("p1", "Warehouse");
        assert!(!team.can("stranger", PermissionAction::CreateTask));
        assert!(!can_perform(None, DEFAULT_ADMIN_ID, PermissionAction::CreateTask));
        assert!(can_perform(Some(&team), DEFAULT_ADMIN_ID, PermissionAction::DeleteTask));
    }
}
