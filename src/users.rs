//! In-memory user directory backing the demo endpoints

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{ApiError, BindingResult, ErrorKind, Failure};

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub login_count: u32,
}

/// Public view of the signed-in user
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserMe {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

impl From<&User> for UserMe {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Body of `POST /users`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> BindingResult {
        let mut result = BindingResult::new();
        match self.email.as_deref().map(str::trim) {
            None | Some("") => result.reject_field("email", None, "must not be blank"),
            Some(email) if !is_email(email) => result.reject_field(
                "email",
                Some(email.into()),
                "must be a well-formed email address",
            ),
            _ => {}
        }
        if let Some(name) = &self.name {
            if name.chars().count() > MAX_NAME_LEN {
                result.reject_field(
                    "name",
                    Some(name.as_str().into()),
                    format!("size must be between 0 and {}", MAX_NAME_LEN),
                );
            }
        }
        if let (Some(name), Some(email)) = (&self.name, &self.email) {
            if !name.is_empty() && name.eq_ignore_ascii_case(email) {
                result.reject("createUserRequest", "name must differ from email");
            }
        }
        result
    }
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

/// Nickname derived from the local part of an email address
fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<Vec<User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn get(&self, id: Uuid) -> Result<User, ApiError> {
        self.read()?
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| {
                ApiError::BadRequest(Failure::new(ErrorKind::ResourceNotFound).with_extra(&id.to_string()))
            })
    }

    /// One page of users; pages start at 1. A page past the end is empty.
    pub fn list(&self, page: usize, page_size: usize) -> Result<Vec<User>, ApiError> {
        let Some(offset) = page.saturating_sub(1).checked_mul(page_size) else {
            return Ok(Vec::new());
        };
        Ok(self
            .read()?
            .iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect())
    }

    pub fn create(&self, request: &CreateUserRequest) -> Result<User, ApiError> {
        let binding = request.validate();
        if binding.has_errors() {
            return Err(ApiError::from_binding(&binding));
        }
        let email = request.email.as_deref().unwrap_or_default().trim().to_string();

        let mut users = self.write()?;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(ApiError::BadRequest(
                Failure::new(ErrorKind::IllegalArgument)
                    .with_extra("email already registered")
                    .with_info("email", email),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: request.name.clone().filter(|n| !n.is_empty()),
            email,
            login_count: 0,
        };
        users.push(user.clone());
        Ok(user)
    }

    /// Look the user up by email, registering them on first sight, and count the login.
    pub fn sign_in(&self, email: &str) -> Result<User, ApiError> {
        let mut users = self.write()?;
        let index = match users.iter().position(|u| u.email.eq_ignore_ascii_case(email)) {
            Some(index) => index,
            None => {
                users.push(User {
                    id: Uuid::new_v4(),
                    name: Some(username_from_email(email)),
                    email: email.to_string(),
                    login_count: 0,
                });
                users.len() - 1
            }
        };
        let user = &mut users[index];
        user.login_count += 1;
        Ok(user.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<User>>, ApiError> {
        self.users
            .read()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned").into())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<User>>, ApiError> {
        self.users
            .write()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: Option<&str>, name: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            email: email.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_blank_email() {
        let binding = request(Some("  "), None).validate();
        assert_eq!(binding.field_errors.len(), 1);
        assert_eq!(binding.field_errors[0].field, "email");
        assert_eq!(binding.field_errors[0].reason, "must not be blank");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let long_name = "x".repeat(60);
        let binding = request(Some("not-an-email"), Some(&long_name)).validate();
        assert_eq!(binding.error_count(), 2);
        assert_eq!(binding.field_errors[0].field, "email");
        assert_eq!(binding.field_errors[1].field, "name");
    }

    #[test]
    fn test_validate_object_level_rule() {
        let binding = request(Some("a@b.io"), Some("a@b.io")).validate();
        assert!(binding.field_errors.is_empty());
        assert_eq!(binding.global_errors[0].object_name, "createUserRequest");
    }

    #[test]
    fn test_create_rejects_invalid_with_validation_error() {
        let directory = UserDirectory::new();
        let err = directory.create(&request(None, None)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v.len() == 1));
    }

    #[test]
    fn test_create_rejects_duplicate_email() {
        let directory = UserDirectory::new();
        directory.create(&request(Some("ada@example.com"), None)).unwrap();
        let err = directory
            .create(&request(Some("ADA@example.com"), None))
            .unwrap_err();
        match err {
            ApiError::BadRequest(f) => {
                assert_eq!(f.kind, ErrorKind::IllegalArgument);
                assert!(f.additional_info.unwrap().contains_key("email"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_get_missing_user_is_not_found() {
        let directory = UserDirectory::new();
        let err = directory.get(Uuid::nil()).unwrap_err();
        match err {
            ApiError::BadRequest(f) => assert_eq!(f.kind.status().as_u16(), 404),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sign_in_creates_then_counts() {
        let directory = UserDirectory::new();
        let first = directory.sign_in("grace@example.com").unwrap();
        assert_eq!(first.name.as_deref(), Some("grace"));
        assert_eq!(first.login_count, 1);

        let second = directory.sign_in("grace@example.com").unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.login_count, 2);
    }

    #[test]
    fn test_list_pages() {
        let directory = UserDirectory::new();
        for i in 0..5 {
            directory.sign_in(&format!("u{}@example.com", i)).unwrap();
        }
        assert_eq!(directory.list(1, 2).unwrap().len(), 2);
        assert_eq!(directory.list(3, 2).unwrap().len(), 1);
        assert!(directory.list(4, 2).unwrap().is_empty());
    }

    #[test]
    fn test_list_offset_overflow_is_empty_page() {
        let directory = UserDirectory::new();
        directory.sign_in("ada@example.com").unwrap();
        assert!(directory.list(i64::MAX as usize, 20).unwrap().is_empty());
        assert!(directory.list(usize::MAX, usize::MAX).unwrap().is_empty());
        assert_eq!(directory.list(1, usize::MAX).unwrap().len(), 1);
    }
}
