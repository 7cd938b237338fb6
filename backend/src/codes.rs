//! Issuing and redeeming emailed verification codes.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::mail;
use crate::models::verification::MAX_ATTEMPTS;
use crate::models::{CodeCheck, EmailVerification, VerificationPurpose};
use crate::state::AppState;

/// Stores a fresh code for (user, purpose) and emails it to `email`.
pub async fn issue(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    purpose: VerificationPurpose,
) -> AppResult<EmailVerification> {
    let record = EmailVerification::issue(user_id, email, purpose, Utc::now());
    let record = state.store.replace_verification(record).await?;
    mail::dispatch(
        state.mailer.clone(),
        mail::verification_code(email, &record.code, purpose),
    );
    log::info!("Issued {} code for user {}", purpose, user_id);
    Ok(record)
}

/// Re-sends a code for a verification already in progress, subject to the
/// resend cooldown.
pub async fn resend(
    state: &AppState,
    user_id: Uuid,
    purpose: VerificationPurpose,
) -> AppResult<EmailVerification> {
    let previous = state
        .store
        .find_active_verification(user_id, purpose)
        .await?
        .ok_or_else(|| AppError::not_found("No pending verification to resend"))?;
    if previous.in_cooldown(Utc::now()) {
        return Err(AppError::TooManyRequests(
            "Please wait a minute before requesting another code".to_string(),
        ));
    }
    issue(state, user_id, &previous.email, purpose).await
}

/// Checks `code` against the active record. A wrong code costs an attempt
/// and a right one consumes the record, each through a single conditional
/// store update. Returns the consumed record on success.
pub async fn redeem(
    state: &AppState,
    user_id: Uuid,
    purpose: VerificationPurpose,
    code: &str,
) -> AppResult<EmailVerification> {
    let mut record = state
        .store
        .find_active_verification(user_id, purpose)
        .await?
        .ok_or_else(|| AppError::not_found("No active verification code"))?;

    let now = Utc::now();
    match record.check(code, now) {
        CodeCheck::Valid => {
            if !state.store.consume_verification(record.id, now).await? {
                return Err(AppError::Gone(
                    "Verification code is no longer valid, request a new one".to_string(),
                ));
            }
            record.consumed_at = Some(now);
            Ok(record)
        }
        CodeCheck::Mismatch => match state.store.record_failed_attempt(record.id).await? {
            Some(attempts) if attempts < MAX_ATTEMPTS => Err(AppError::bad_request(format!(
                "Invalid verification code, {} attempts remaining",
                MAX_ATTEMPTS - attempts
            ))),
            _ => Err(too_many_attempts(user_id)),
        },
        CodeCheck::Expired => Err(AppError::Gone(
            "Verification code has expired, request a new one".to_string(),
        )),
        CodeCheck::TooManyAttempts => Err(too_many_attempts(user_id)),
        CodeCheck::AlreadyUsed => Err(AppError::Gone(
            "Verification code was already used".to_string(),
        )),
    }
}

fn too_many_attempts(user_id: Uuid) -> AppError {
    log::info!("Verification code for user {} burned after too many attempts", user_id);
    AppError::TooManyRequests("Too many attempts, request a new code".to_string())
}
