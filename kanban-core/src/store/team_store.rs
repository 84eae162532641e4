//! Team Store / Permission Model
//!
//! One team per project, keyed by the project id. Lookups for permission
//! checks fail closed: a missing team or member means "denied".
//! Team state lives only in its repository and is never persisted.
//! Mutations are serialized by `write_lock`.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use super::state::ChangeFeed;
use crate::domain::{
    can_perform, validate_required, DomainError, DomainResult, MemberRole, NewMember, PermissionAction, Permissions,
    Team, TeamMember, TeamPatch,
};
use crate::repository::Repository;

pub struct TeamStore {
    repo: Arc<dyn Repository<Team>>,
    changes: ChangeFeed,
    error: Mutex<Option<String>>,
    write_lock: Mutex<()>,
}

impl TeamStore {
    pub fn new(repo: Arc<dyn Repository<Team>>) -> Self {
        Self {
            repo,
            changes: ChangeFeed::new(),
            error: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn clear_error(&self) {
        *self.error.lock().await = None;
    }

    pub async fn get_team(&self, project_id: &str) -> DomainResult<Option<Team>> {
        self.repo.find_by_id(project_id).await
    }

    pub async fn list_teams(&self) -> DomainResult<Vec<Team>> {
        self.repo.list().await
    }

    /// Named permission flag of `member_id` in the project's team.
    /// False when the team or member is missing, or the lookup fails.
    pub async fn can_member_perform_action(&self, project_id: &str, member_id: &str, action: PermissionAction) -> bool {
        match self.repo.find_by_id(project_id).await {
            Ok(team) => can_perform(team.as_ref(), member_id, action),
            Err(e) => {
                tracing::warn!(project_id, error = %e, "team lookup failed, denying");
                false
            }
        }
    }

    pub async fn require_permission(&self, project_id: &str, member_id: &str, action: PermissionAction) -> DomainResult<()> {
        if self.can_member_perform_action(project_id, member_id, action).await {
            Ok(())
        } else {
            tracing::info!(project_id, member_id, %action, "permission denied");
            Err(DomainError::PermissionDenied(format!("{} may not {}", member_id, action)))
        }
    }

    /// Existing team, or a fresh default team with the synthetic admin
    pub async fn ensure_default_team(&self, project_id: &str, project_name: &str) -> DomainResult<Team> {
        let _write = self.write_lock.lock().await;
        let result = self.provision_default(project_id, project_name).await;
        self.settle("ensure_default_team", result).await
    }

    pub async fn create_team(
        &self,
        project_id: &str,
        name: &str,
        description: &str,
        creator: NewMember,
    ) -> DomainResult<Team> {
        let _write = self.write_lock.lock().await;
        let result = self.insert_team(project_id, name, description, creator).await;
        self.settle("create_team", result).await
    }

    pub async fn update_team(&self, project_id: &str, patch: TeamPatch, actor: &str) -> DomainResult<Team> {
        let _write = self.write_lock.lock().await;
        let result = self.edit_team(project_id, patch, actor).await;
        self.settle("update_team", result).await
    }

    pub async fn delete_team(&self, project_id: &str, actor: &str) -> DomainResult<()> {
        let _write = self.write_lock.lock().await;
        let result = async {
            self.require_permission(project_id, actor, PermissionAction::ManageTeam).await?;
            self.repo.delete(project_id).await?;
            tracing::info!(project_id, "team deleted");
            Ok::<(), DomainError>(())
        }
        .await;
        self.settle("delete_team", result).await
    }

    pub async fn add_member(&self, project_id: &str, member: NewMember, actor: &str) -> DomainResult<TeamMember> {
        let _write = self.write_lock.lock().await;
        let result = self.insert_member(project_id, member, actor).await;
        self.settle("add_member", result).await
    }

    pub async fn update_member_permissions(
        &self,
        project_id: &str,
        member_id: &str,
        permissions: Permissions,
        actor: &str,
    ) -> DomainResult<TeamMember> {
        let _write = self.write_lock.lock().await;
        let result = self
            .edit_member(project_id, member_id, actor, |member| member.permissions = permissions)
            .await;
        self.settle("update_member_permissions", result).await
    }

    /// Change the role; `reseed` also resets the flags to the role's defaults
    pub async fn update_member_role(
        &self,
        project_id: &str,
        member_id: &str,
        role: MemberRole,
        reseed: bool,
        actor: &str,
    ) -> DomainResult<TeamMember> {
        let _write = self.write_lock.lock().await;
        let result = self
            .edit_member(project_id, member_id, actor, |member| {
                member.role = role;
                if reseed {
                    member.permissions = Permissions::for_role(role);
                }
            })
            .await;
        self.settle("update_member_role", result).await
    }

    pub async fn remove_member(&self, project_id: &str, member_id: &str, actor: &str) -> DomainResult<()> {
        let _write = self.write_lock.lock().await;
        let result = self.delete_member(project_id, member_id, actor).await;
        self.settle("remove_member", result).await
    }

    async fn settle<T>(&self, action: &'static str, result: DomainResult<T>) -> DomainResult<T> {
        let mut error = self.error.lock().await;
        match &result {
            Ok(_) => {
                *error = None;
                self.changes.bump();
            }
            Err(e) => {
                tracing::warn!(action, error = %e, "team action failed");
                *error = Some(e.to_string());
            }
        }
        result
    }

    async fn load_team(&self, project_id: &str) -> DomainResult<Team> {
        self.repo
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("team for project {}", project_id)))
    }

    async fn provision_default(&self, project_id: &str, project_name: &str) -> DomainResult<Team> {
        if let Some(team) = self.repo.find_by_id(project_id).await? {
            return Ok(team);
        }
        let team = self.repo.create(&Team::default_for_project(project_id, project_name)).await?;
        tracing::info!(project_id, "default team provisioned");
        Ok(team)
    }

    async fn insert_team(&self, project_id: &str, name: &str, description: &str, creator: NewMember) -> DomainResult<Team> {
        let name = validate_required("Team name", name)?;
        if self.repo.find_by_id(project_id).await?.is_some() {
            return Err(DomainError::Validation(format!("Project {} already has a team", project_id)));
        }

        let creator = new_member(creator)?;
        let team = Team::new(project_id.to_string(), name, description.trim().to_string(), creator);
        ensure_manager_remains(&team)?;
        self.repo.create(&team).await
    }

    async fn edit_team(&self, project_id: &str, patch: TeamPatch, actor: &str) -> DomainResult<Team> {
        self.require_permission(project_id, actor, PermissionAction::ManageTeam).await?;
        let mut team = self.load_team(project_id).await?;

        if let Some(name) = patch.name {
            team.name = validate_required("Team name", &name)?;
        }
        if let Some(description) = patch.description {
            team.description = description.trim().to_string();
        }
        if let Some(columns) = patch.custom_columns {
            let columns: Vec<String> = columns
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            team.custom_columns = columns;
        }
        self.repo.update(&team).await
    }

    async fn insert_member(&self, project_id: &str, member: NewMember, actor: &str) -> DomainResult<TeamMember> {
        self.require_permission(project_id, actor, PermissionAction::ManageTeam).await?;
        let mut team = self.load_team(project_id).await?;

        let member = new_member(member)?;
        if team.members.iter().any(|m| m.email.eq_ignore_ascii_case(&member.email)) {
            return Err(DomainError::Validation(format!("{} is already on the team", member.email)));
        }

        team.members.push(member.clone());
        self.repo.update(&team).await?;
        tracing::info!(project_id, member_id = %member.id, "member added");
        Ok(member)
    }

    async fn edit_member<F>(&self, project_id: &str, member_id: &str, actor: &str, change: F) -> DomainResult<TeamMember>
    where
        F: FnOnce(&mut TeamMember) + Send,
    {
        self.require_permission(project_id, actor, PermissionAction::ManageTeam).await?;
        let mut team = self.load_team(project_id).await?;

        let member = team
            .member_mut(member_id)
            .ok_or_else(|| DomainError::NotFound(format!("member {}", member_id)))?;
        change(member);
        let updated = member.clone();

        ensure_manager_remains(&team)?;
        self.repo.update(&team).await?;
        Ok(updated)
    }

    async fn delete_member(&self, project_id: &str, member_id: &str, actor: &str) -> DomainResult<()> {
        self.require_permission(project_id, actor, PermissionAction::ManageTeam).await?;
        let mut team = self.load_team(project_id).await?;

        let before = team.members.len();
        team.members.retain(|m| m.id != member_id);
        if team.members.len() == before {
            return Err(DomainError::NotFound(format!("member {}", member_id)));
        }

        ensure_manager_remains(&team)?;
        self.repo.update(&team).await?;
        tracing::info!(project_id, member_id, "member removed");
        Ok(())
    }
}

fn new_member(data: NewMember) -> DomainResult<TeamMember> {
    let name = validate_required("Member name", &data.name)?;
    let email = validate_required("Member email", &data.email)?;
    Ok(TeamMember::new(name, email, data.role))
}

/// A team must keep at least one member able to manage it
fn ensure_manager_remains(team: &Team) -> DomainResult<()> {
    if team.has_manager() {
        Ok(())
    } else {
        Err(DomainError::Validation(
            "At least one member must be able to manage the team".to_string(),
        ))
    }
}
