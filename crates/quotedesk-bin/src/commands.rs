//! Command handlers for the quotedesk CLI.
//!
//! Every handler restores the persisted session first, the same way the
//! dashboard does at startup. Login and registration refuse to run over
//! an existing session; sign out first.

use quotedesk_auth::{ApiRequest, AuthResult, SessionRuntime, SessionStatus};
use tracing::debug;

/// Restore the stored session, treating any failure as "no session".
async fn restore(runtime: &SessionRuntime) {
    if let Err(e) = runtime.restore_session().await {
        debug!(error = %e, "session restore failed");
    }
}

/// Sign in and persist the session.
pub async fn login(runtime: &SessionRuntime, email: &str, password: &str) -> AuthResult<()> {
    restore(runtime).await;
    if let Some(user) = runtime.user() {
        println!(
            "Already signed in as {}. Run `quotedesk logout` first.",
            user.email
        );
        return Ok(());
    }

    let session = runtime.login(email, password).await?;
    if let Some(user) = session.user {
        println!("Signed in as {}", user.email);
    }
    Ok(())
}

/// Create an account and sign in with it.
pub async fn register(
    runtime: &SessionRuntime,
    email: &str,
    password: &str,
    display_name: &str,
) -> AuthResult<()> {
    restore(runtime).await;
    if let Some(user) = runtime.user() {
        println!(
            "Already signed in as {}. Run `quotedesk logout` first.",
            user.email
        );
        return Ok(());
    }

    runtime.register(email, password, display_name).await?;
    println!("Account created, signed in as {}", email);
    Ok(())
}

/// Sign out, clearing stored credentials even if the server call fails.
pub async fn logout(runtime: &SessionRuntime) -> AuthResult<()> {
    restore(runtime).await;
    runtime.logout().await?;
    println!("Signed out");
    Ok(())
}

/// Show the current session status.
pub async fn status(runtime: &SessionRuntime) -> AuthResult<()> {
    restore(runtime).await;

    let session = runtime.session();
    println!("Status: {}", status_label(session.status));
    if let Some(user) = session.user {
        match user.display_name {
            Some(name) => println!("User: {} <{}>", name, user.email),
            None => println!("User: {}", user.email),
        }
    }
    Ok(())
}

/// Print the signed-in user as JSON, fetched fresh from the server.
pub async fn whoami(runtime: &SessionRuntime) -> AuthResult<()> {
    restore(runtime).await;

    if runtime.user().is_none() {
        println!("Not signed in");
        return Ok(());
    }

    let user = match runtime.fetch_profile().await {
        Ok(user) => user,
        Err(e) if e.is_transient() => {
            debug!(error = %e, "profile fetch failed, showing stored snapshot");
            match runtime.user() {
                Some(user) => user,
                None => {
                    println!("Not signed in");
                    return Ok(());
                }
            }
        }
        Err(e) => return Err(e),
    };

    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

/// GET an API path through the authorized pipeline and print the result.
pub async fn fetch(runtime: &SessionRuntime, path: &str) -> AuthResult<()> {
    let restored = runtime.restore_session().await?;
    if !restored {
        debug!("no stored session, sending unauthenticated request");
    }

    let response = runtime.request(ApiRequest::get(path)).await?;
    println!("HTTP {}", response.status);
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}

fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Anonymous => "anonymous",
        SessionStatus::Authenticating => "authenticating",
        SessionStatus::Authenticated => "authenticated",
        SessionStatus::Refreshing => "refreshing",
        SessionStatus::Expired => "expired",
    }
}
