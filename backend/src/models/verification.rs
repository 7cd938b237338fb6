//! Short-lived email codes backing two-factor login, email changes and
//! password resets.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use rand::Rng;
use uuid::Uuid;

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL_MINUTES: i64 = 10;
pub const MAX_ATTEMPTS: i32 = 5;
/// Minimum spacing between two codes for the same purpose.
pub const RESEND_COOLDOWN_SECONDS: i64 = 60;

text_enum! {
    VerificationPurpose {
        Login => "login",
        EmailChange => "email_change",
        PasswordReset => "password_reset",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::email_verifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct EmailVerification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub purpose: VerificationPurpose,
    pub code: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of checking a submitted code against the active record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Mismatch,
    Expired,
    TooManyAttempts,
    AlreadyUsed,
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl EmailVerification {
    pub fn issue(
        user_id: Uuid,
        email: impl Into<String>,
        purpose: VerificationPurpose,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            email: email.into(),
            purpose,
            code: generate_code(),
            attempts: 0,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
            consumed_at: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        now < self.created_at + Duration::seconds(RESEND_COOLDOWN_SECONDS)
    }

    /// Classifies `submitted` against the record as loaded. The record is
    /// left alone: the store counts the attempt or consumes the code with a
    /// conditional update, so concurrent submissions cannot both win.
    pub fn check(&self, submitted: &str, now: DateTime<Utc>) -> CodeCheck {
        if self.consumed_at.is_some() {
            return CodeCheck::AlreadyUsed;
        }
        if self.is_expired(now) {
            return CodeCheck::Expired;
        }
        if self.attempts >= MAX_ATTEMPTS {
            return CodeCheck::TooManyAttempts;
        }
        if constant_time_eq(self.code.as_bytes(), submitted.trim().as_bytes()) {
            CodeCheck::Valid
        } else {
            CodeCheck::Mismatch
        }
    }

    /// Whether the store may still count a failed attempt or consume the code.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.attempts < MAX_ATTEMPTS && !self.is_expired(now)
    }
}

/// `rahim@example.com` becomes `ra***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{}***@{}", visible, domain)
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(now: DateTime<Utc>) -> EmailVerification {
        let mut record =
            EmailVerification::issue(Uuid::new_v4(), "a@b.com", VerificationPurpose::Login, now);
        record.code = "123456".to_string();
        record
    }

    #[test]
    fn codes_are_six_digits() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn check_classifies_without_changing_the_record() {
        let now = Utc::now();
        let record = record(now);
        assert_eq!(record.check(" 123456 ", now), CodeCheck::Valid);
        assert_eq!(record.check("000000", now), CodeCheck::Mismatch);
        assert_eq!(record.attempts, 0);
        assert!(record.consumed_at.is_none());
    }

    #[test]
    fn consumed_code_is_single_use() {
        let now = Utc::now();
        let mut record = record(now);
        record.consumed_at = Some(now);
        assert_eq!(record.check("123456", now), CodeCheck::AlreadyUsed);
        assert!(!record.is_redeemable(now));
    }

    #[test]
    fn code_expires_after_ten_minutes() {
        let now = Utc::now();
        let record = record(now);
        let later = now + Duration::minutes(CODE_TTL_MINUTES);
        assert_eq!(record.check("123456", later), CodeCheck::Expired);
        assert!(!record.is_redeemable(later));
    }

    #[test]
    fn burned_code_rejects_even_the_right_value() {
        let now = Utc::now();
        let mut record = record(now);
        record.attempts = MAX_ATTEMPTS;
        assert_eq!(record.check("123456", now), CodeCheck::TooManyAttempts);
        assert!(!record.is_redeemable(now));
    }

    #[test]
    fn masks_local_part() {
        assert_eq!(mask_email("rahim@example.com"), "ra***@example.com");
        assert_eq!(mask_email("broken"), "***");
    }
}
