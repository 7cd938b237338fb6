use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// Consecutive wrong passwords that lock an account.
pub const MAX_FAILED_LOGINS: i32 = 5;
/// How long a locked account stays locked.
pub const LOCKOUT_MINUTES: i64 = 15;

text_enum! {
    Role {
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    AuthProvider {
        Local => "local",
        Google => "google",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub mobile: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub auth_provider: AuthProvider,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub favorites: Vec<Uuid>,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, provider: AuthProvider, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email: email.trim().to_lowercase(),
            mobile: None,
            password_hash: None,
            avatar: None,
            role: Role::User,
            auth_provider: provider,
            email_verified: provider == AuthProvider::Google,
            two_factor_enabled: false,
            favorites: Vec::new(),
            failed_login_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins always go through the emailed code; other accounts opt in.
    pub fn requires_second_factor(&self) -> bool {
        self.is_admin() || self.two_factor_enabled
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Counts a wrong password. Returns true when this attempt locked the
    /// account.
    pub fn register_failed_login(&mut self, now: DateTime<Utc>) -> bool {
        self.failed_login_attempts += 1;
        self.updated_at = now;
        if self.failed_login_attempts >= MAX_FAILED_LOGINS {
            self.failed_login_attempts = 0;
            self.locked_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
            return true;
        }
        false
    }

    pub fn clear_login_failures(&mut self) {
        self.failed_login_attempts = 0;
        self.locked_until = None;
    }

    pub fn has_login_failures(&self) -> bool {
        self.failed_login_attempts > 0 || self.locked_until.is_some()
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
            avatar: self.avatar.clone(),
            role: self.role,
            auth_provider: self.auth_provider,
            email_verified: self.email_verified,
            two_factor_enabled: self.two_factor_enabled,
            favorites: self.favorites.clone(),
            created_at: self.created_at,
        }
    }

    pub fn to_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account as shown to its owner and to admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub mobile: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub auth_provider: AuthProvider,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub favorites: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Account as shown to everybody else.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}
