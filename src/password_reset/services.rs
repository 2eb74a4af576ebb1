//! Request → verify → reset flow for forgotten passwords.
//!
//! All per-user state lives in the injected [`KvStore`]: `otp_{id}` holds the
//! issued code, `otp_attempts_{id}` counts wrong guesses against it and
//! `otp_verified_{id}` marks a successful verification. Expiry is the store's
//! TTL and nothing else, so an expired code and a code that was never issued
//! look the same.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::otp::{attempts_key, codes_match, generate_code, otp_key, verified_key};
use crate::{
    auth::password::{hash_password, validate_password},
    cache::KvStore,
    config::OtpConfig,
    error::AppError,
    mail::{Mail, Mailer},
    users::repo_types::User,
};

const OTP_SUBJECT: &str = "Password reset code";

/// The slice of the user store the reset flow needs.
#[async_trait]
pub trait ResetAccounts: Send + Sync {
    async fn find_id_by_email(&self, email: &str) -> anyhow::Result<Option<Uuid>>;
    /// Returns whether the user still existed.
    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<bool>;
}

#[async_trait]
impl ResetAccounts for PgPool {
    async fn find_id_by_email(&self, email: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(User::find_by_email(self, email).await?.map(|u| u.id))
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        User::set_password_hash(self, user_id, password_hash).await
    }
}

pub struct PasswordReset<'a> {
    accounts: &'a dyn ResetAccounts,
    kv: &'a dyn KvStore,
    mailer: &'a dyn Mailer,
    otp: &'a OtpConfig,
    from: &'a str,
}

impl<'a> PasswordReset<'a> {
    pub fn new(
        accounts: &'a dyn ResetAccounts,
        kv: &'a dyn KvStore,
        mailer: &'a dyn Mailer,
        otp: &'a OtpConfig,
        from: &'a str,
    ) -> Self {
        Self {
            accounts,
            kv,
            mailer,
            otp,
            from,
        }
    }

    async fn resolve(&self, email: &str) -> Result<Uuid, AppError> {
        match self.accounts.find_id_by_email(email).await? {
            Some(id) => Ok(id),
            None => {
                warn!(%email, "password reset for unknown email");
                Err(AppError::NotFound("User"))
            }
        }
    }

    /// Issues a fresh code and mails it. Any earlier verification is void.
    pub async fn request_otp(&self, email: &str) -> Result<(), AppError> {
        let user_id = self.resolve(email).await?;
        let key = otp_key(user_id);
        let code = generate_code();

        self.kv
            .set(&key, &code, Duration::from_secs(self.otp.ttl_secs))
            .await?;
        self.kv.delete(&verified_key(user_id)).await?;
        self.kv.delete(&attempts_key(user_id)).await?;

        let mail = Mail {
            subject: OTP_SUBJECT.into(),
            body: format!(
                "Your password reset code is {code}. It expires in {} minutes.",
                self.otp.ttl_secs / 60
            ),
            from: self.from.to_string(),
            to: vec![email.to_string()],
        };
        if let Err(e) = self.mailer.send(mail).await {
            error!(user_id = %user_id, error = %e, "otp delivery failed");
            if let Err(cleanup) = self.kv.delete(&key).await {
                error!(user_id = %user_id, error = %cleanup, "failed to revoke undelivered otp");
            }
            return Err(AppError::Delivery(e));
        }

        info!(user_id = %user_id, "password reset code issued");
        Ok(())
    }

    pub async fn verify_otp(&self, email: &str, submitted: &str) -> Result<(), AppError> {
        let user_id = self.resolve(email).await?;
        let key = otp_key(user_id);

        let Some(stored) = self.kv.get(&key).await? else {
            warn!(user_id = %user_id, "otp expired or never issued");
            return Err(AppError::InvalidOrExpiredOtp);
        };
        if !codes_match(&stored, submitted.trim()) {
            self.record_miss(user_id).await?;
            return Err(AppError::InvalidOrExpiredOtp);
        }
        // the delete doubles as a claim: of two concurrent verifications only one wins
        if !self.kv.delete(&key).await? {
            warn!(user_id = %user_id, "otp claimed by a concurrent verification");
            return Err(AppError::InvalidOrExpiredOtp);
        }
        self.kv.delete(&attempts_key(user_id)).await?;

        self.kv
            .set(
                &verified_key(user_id),
                "true",
                Duration::from_secs(self.otp.verified_ttl_secs),
            )
            .await?;
        info!(user_id = %user_id, "otp verified");
        Ok(())
    }

    /// Counts a wrong guess; the pending code is revoked once the limit is hit.
    async fn record_miss(&self, user_id: Uuid) -> Result<(), AppError> {
        let counter = attempts_key(user_id);
        let misses = self
            .kv
            .incr(&counter, Duration::from_secs(self.otp.ttl_secs))
            .await?;
        if misses >= self.otp.max_attempts {
            self.kv.delete(&otp_key(user_id)).await?;
            self.kv.delete(&counter).await?;
            warn!(user_id = %user_id, misses, "otp revoked after too many wrong codes");
        } else {
            warn!(user_id = %user_id, misses, "wrong otp");
        }
        Ok(())
    }

    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), AppError> {
        validate_password(new_password)?;
        let user_id = self.resolve(email).await?;
        let flag = verified_key(user_id);

        if self.kv.get(&flag).await?.is_none() {
            warn!(user_id = %user_id, "reset attempted without verified otp");
            return Err(AppError::OtpNotVerified);
        }

        let hash = hash_password(new_password)?;
        if !self.accounts.set_password_hash(user_id, &hash).await? {
            return Err(AppError::NotFound("User"));
        }
        self.kv.delete(&flag).await?;

        info!(user_id = %user_id, "password reset");
        Ok(())
    }
}
