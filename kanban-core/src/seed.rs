//! Demo data for a fresh install

use crate::domain::{DomainResult, Entity, NewUser, Project, User, UserRole};
use crate::repository::Repository;

pub fn demo_projects() -> Vec<Project> {
    vec![
        Project::new(
            "Kitchen Renovation".to_string(),
            "Cabinets, wiring and tiling for the Elm Street house".to_string(),
        ),
        Project::new(
            "Office Fit-out".to_string(),
            "Second floor partitions and network drops".to_string(),
        ),
    ]
}

pub fn demo_users() -> DomainResult<Vec<User>> {
    let users = [
        ("Maria Lopez", "maria.lopez@example.com", UserRole::Admin, "Management", "Project Lead"),
        ("Tom Becker", "tom.becker@example.com", UserRole::Manager, "Field", "Site Foreman"),
        ("Aisha Khan", "aisha.khan@example.com", UserRole::Member, "Field", "Electrician"),
    ];

    users
        .into_iter()
        .map(|(name, email, role, department, position)| {
            User::new(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                role,
                department: Some(department.to_string()),
                position: Some(position.to_string()),
                ..NewUser::default()
            })
        })
        .collect()
}

/// Insert `items` only when `repo` is empty. Returns how many were added.
pub async fn seed_if_empty<T: Entity>(repo: &dyn Repository<T>, items: Vec<T>) -> DomainResult<usize> {
    if !repo.list().await?.is_empty() {
        return Ok(0);
    }
    for item in &items {
        repo.create(item).await?;
    }
    Ok(items.len())
}
