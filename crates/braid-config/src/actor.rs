//! Actor and owner identity resolution.

use std::env;
use std::process::Command;

use crate::config::BraidConfig;

/// Resolves the actor name for audit fields.
///
/// Priority: config `actor` (unless literally `${USER}`) > `BD_ACTOR` env >
/// `BEADS_ACTOR` env > `git config user.name` > `$USER` > `"unknown"`.
pub fn resolve_actor(config: &BraidConfig) -> String {
    if let Some(ref actor) = config.actor {
        if !actor.is_empty() && actor != "${USER}" {
            return actor.clone();
        }
    }

    for var in ["BD_ACTOR", "BEADS_ACTOR"] {
        if let Ok(actor) = env::var(var) {
            if !actor.is_empty() {
                return actor;
            }
        }
    }

    if let Some(name) = git_config("user.name") {
        return name;
    }

    if let Ok(user) = env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}

/// Resolves the owner identity (for attribution).
///
/// Priority: `GIT_AUTHOR_EMAIL` env > `git config user.email` > empty.
pub fn resolve_owner() -> String {
    if let Ok(email) = env::var("GIT_AUTHOR_EMAIL") {
        if !email.is_empty() {
            return email;
        }
    }

    git_config("user.email").unwrap_or_default()
}

fn git_config(key: &str) -> Option<String> {
    let output = Command::new("git").args(["config", key]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}
