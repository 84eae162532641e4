//! User Entity
//!
//! Profile records shown on the profile/settings screens.
//! Unrelated to `TeamMember` even where the people overlap.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::entity::{generate_id, validate_required, DomainError, DomainResult, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    #[default]
    Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(data: NewUser) -> DomainResult<Self> {
        let name = validate_required("Name", &data.name)?;
        let email = validate_email(&data.email)?;
        let now = Utc::now();
        Ok(Self {
            id: generate_id(),
            name,
            email,
            role: data.role,
            phone: data.phone,
            department: data.department,
            position: data.position,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }

    /// Filter match; the search text looks at name and email
    pub fn matches(&self, filters: &UserFilters) -> bool {
        if let Some(role) = filters.role {
            if self.role != role {
                return false;
            }
        }
        if let Some(department) = filters.department.as_deref() {
            if self.department.as_deref() != Some(department) {
                return false;
            }
        }
        match filters.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => {
                let needle = search.to_lowercase();
                self.name.to_lowercase().contains(&needle) || self.email.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub position: Option<Option<String>>,
}

impl UserPatch {
    /// Validates before touching `user`
    pub fn apply(self, user: &mut User) -> DomainResult<()> {
        let name = self.name.map(|n| validate_required("Name", &n)).transpose()?;
        let email = self.email.map(|e| validate_email(&e)).transpose()?;

        if let Some(name) = name {
            user.name = name;
        }
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(department) = self.department {
            user.department = department;
        }
        if let Some(position) = self.position {
            user.position = position;
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

/// Active list filters on the users screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilters {
    pub role: Option<UserRole>,
    pub department: Option<String>,
    pub search: Option<String>,
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

fn validate_email(email: &str) -> DomainResult<String> {
    let email = validate_required("Email", email)?;
    if !email_regex().is_match(&email) {
        return Err(DomainError::Validation(format!("'{}' is not a valid email", email)));
    }
    Ok(email)
}
