//! Account management commands.

use serde_json::json;

use swatchbook::Swatchbook;
use swatchbook::services::accounts::LoginOutcome;

use super::{emit, emit_value};

/// Subscribe an email address.
pub async fn subscribe(app: &Swatchbook, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let account = app.accounts().subscribe(email).await?;
    tracing::info!(account = %account.id, "subscribed");
    emit(&account)
}

/// Register a member. Prints the verification token for out-of-band delivery.
pub async fn register(
    app: &Swatchbook,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registration = app.accounts().register(email, password, name).await?;
    emit_value(&json!({
        "account": registration.account,
        "verificationToken": registration.verification_token,
    }))
}

/// Check a member's credentials.
pub async fn login(
    app: &Swatchbook,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match app.accounts().login(email, password).await? {
        LoginOutcome::Authenticated(account) => emit(&account),
        LoginOutcome::Throttled(decision) => Err(format!(
            "Too many login attempts, retry after {}",
            decision.reset_at.to_rfc3339()
        )
        .into()),
    }
}

/// Verify an email with its token.
pub async fn verify(app: &Swatchbook, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let account = app
        .accounts()
        .verify_email(token)
        .await?
        .ok_or("Verification token is invalid or already used")?;
    emit(&account)
}

/// Change a member's password.
pub async fn change_password(
    app: &Swatchbook,
    email: &str,
    current: &str,
    new: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let account = app.accounts().change_password(email, current, new).await?;
    tracing::info!(account = %account.id, "password changed");
    emit(&account)
}

/// Deactivate an account.
pub async fn deactivate(app: &Swatchbook, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let account = app.accounts().deactivate(email).await?;
    tracing::info!(account = %account.id, "account deactivated");
    emit(&account)
}
