use lazy_static::lazy_static;
use regex::Regex;

use super::{
    dto::{AuthResponse, LoginUser},
    jwt::JwtKeys,
};
use crate::{error::AppError, users::repo_types::User};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lower-cases the domain part. The local part is kept verbatim,
/// so `Alice@Example.COM` and `alice@example.com` are different accounts.
pub(crate) fn normalize_email(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

pub(crate) fn parse_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if email.len() > 254 || !is_valid_email(&email) {
        return Err(AppError::validation("email", "Enter a valid email address."));
    }
    Ok(email)
}

pub(crate) fn issue_tokens(keys: &JwtKeys, user: &User) -> anyhow::Result<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id, &user.email)?,
        refresh_token: keys.sign_refresh(user.id, &user.email)?,
        token_type: "Bearer",
        user: LoginUser {
            id: user.id,
            email: user.email.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_domain_is_lowercased_local_part_kept() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "Alice@example.com");
        assert_eq!(normalize_email("bob@x.io"), "bob@x.io");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn parse_email_rejects_malformed_input() {
        assert!(parse_email("user@example.com").is_ok());
        for bad in ["", "user", "user@", "@example.com", "user@example", "a b@example.com"] {
            assert!(
                matches!(parse_email(bad), Err(AppError::Validation { field: "email", .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
