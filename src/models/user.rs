// src/models/user.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use validator::Validate;

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.@-]+$").expect("username pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

/// What the account has paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Practice only, with a smaller pool per request.
    Free,
    Premium,
    /// Premium plus coaching-group membership.
    Coaching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Active,
    Suspended,
}

/// Effective state used to gate routes. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Active,
    Pending,
    Suspended,
    Expired,
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username (usually the e-mail address).
    pub username: String,

    pub display_name: Option<String>,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub role: UserRole,
    pub access_type: AccessType,
    pub status: AccountStatus,

    /// End of the paid access window. `None` means no expiry.
    pub expires_at: Option<DateTime<Utc>>,

    pub simulation_count: i32,
    #[serde(serialize_with = "two_decimals")]
    pub average_score: f64,
    pub total_time_seconds: i64,

    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn account_state(&self, now: DateTime<Utc>) -> AccountState {
        if self.is_admin() {
            return AccountState::Active;
        }
        match self.status {
            AccountStatus::Pending => AccountState::Pending,
            AccountStatus::Suspended => AccountState::Suspended,
            AccountStatus::Active => match self.expires_at {
                Some(expiry) if expiry <= now => AccountState::Expired,
                _ => AccountState::Active,
            },
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            simulation_count: self.simulation_count,
            average_score: self.average_score,
            total_time_seconds: self.total_time_seconds,
        }
    }
}

/// Aggregate simulation stats kept on the profile row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub simulation_count: i32,
    /// Stored unrounded; serialized with two decimals.
    #[serde(serialize_with = "two_decimals")]
    pub average_score: f64,
    pub total_time_seconds: i64,
}

impl UserStats {
    /// Folds one finished simulation into the running average.
    pub fn record_simulation(&mut self, percentage: f64, seconds: i64) {
        let n = f64::from(self.simulation_count);
        self.average_score = (self.average_score * n + percentage) / (n + 1.0);
        self.simulation_count += 1;
        self.total_time_seconds += seconds.max(0);
    }
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 100.0).round() / 100.0)
}

/// Profile payload for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub account_state: AccountState,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(
            min = 3,
            max = 100,
            message = "Username length must be between 3 and 100 characters."
        ),
        regex(path = *USERNAME, message = "Username contains invalid characters.")
    )]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for admin updates. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub access_type: Option<AccessType>,
    pub status: Option<AccountStatus>,
    /// Explicit `null` is not distinguishable from absent; use `clear_expiry` to remove.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clear_expiry: bool,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(role: UserRole, status: AccountStatus, expires_at: Option<DateTime<Utc>>) -> User {
        User {
            id: 1,
            username: "candidate@example.com".into(),
            display_name: None,
            password: String::new(),
            role,
            access_type: AccessType::Premium,
            status,
            expires_at,
            simulation_count: 0,
            average_score: 0.0,
            total_time_seconds: 0,
            created_at: None,
        }
    }

    #[test]
    fn expired_access_is_reported() {
        let now = Utc::now();
        let u = user(UserRole::User, AccountStatus::Active, Some(now - Duration::days(1)));
        assert_eq!(u.account_state(now), AccountState::Expired);
    }

    #[test]
    fn future_expiry_is_active() {
        let now = Utc::now();
        let u = user(UserRole::User, AccountStatus::Active, Some(now + Duration::days(30)));
        assert_eq!(u.account_state(now), AccountState::Active);
    }

    #[test]
    fn pending_wins_over_expiry() {
        let now = Utc::now();
        let u = user(UserRole::User, AccountStatus::Pending, Some(now - Duration::days(1)));
        assert_eq!(u.account_state(now), AccountState::Pending);
    }

    #[test]
    fn admins_are_always_active() {
        let now = Utc::now();
        let u = user(UserRole::Admin, AccountStatus::Suspended, Some(now - Duration::days(1)));
        assert_eq!(u.account_state(now), AccountState::Active);
    }

    #[test]
    fn running_average_is_average_of_percentages() {
        let mut stats = UserStats::default();
        stats.record_simulation(50.0, 3000);
        stats.record_simulation(70.0, 4000);
        stats.record_simulation(90.0, 5000);
        assert_eq!(stats.simulation_count, 3);
        assert_eq!(stats.average_score, 70.0);
        assert_eq!(stats.total_time_seconds, 12_000);
    }

    #[test]
    fn running_average_keeps_full_precision() {
        let mut stats = UserStats::default();
        for p in [100.0, 0.0, 0.0] {
            stats.record_simulation(p, 60);
        }
        assert!((stats.average_score - 100.0 / 3.0).abs() < 1e-9);

        // Many folds do not drift from the true mean
        let mut stats = UserStats::default();
        let scores: Vec<f64> = (0..200).map(|i| 55.0 + f64::from(i % 7) * 3.333).collect();
        for p in &scores {
            stats.record_simulation(*p, 60);
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        assert!((stats.average_score - mean).abs() < 1e-9);

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["average_score"], (mean * 100.0).round() / 100.0);
    }

    #[test]
    fn negative_time_is_not_added() {
        let mut stats = UserStats::default();
        stats.record_simulation(80.0, -5);
        assert_eq!(stats.total_time_seconds, 0);
    }

    #[test]
    fn username_pattern_rejects_spaces() {
        let req = CreateUserRequest {
            username: "bad name".into(),
            password: "password123".into(),
            display_name: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let mut u = user(UserRole::User, AccountStatus::Active, None);
        u.password = "$argon2id$secret".into();
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "user");
    }
}
