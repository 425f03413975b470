//! TOTP engine: secret generation, provisioning URIs and code validation.
//!
//! RFC 6238 with the usual authenticator-app parameters: SHA-1, 6 digits,
//! 30-second steps. Codes are accepted within two steps either side of now
//! to tolerate clock drift. No replay tracking happens here; every call
//! re-validates against the live clock.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::services::error::ServiceError;

const DIGITS: usize = 6;
const SKEW: u8 = 2;
const STEP: u64 = 30;

/// Enrollment material handed to the user exactly once.
#[derive(Debug, Clone)]
pub struct TotpSetup {
    /// Base32-encoded 160-bit secret.
    pub secret: String,
    /// otpauth:// URI for authenticator-app QR display.
    pub provisioning_uri: String,
}

#[derive(Clone)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a fresh random secret bound to the user's identity label.
    pub fn generate_setup(&self, account_label: &str) -> Result<TotpSetup, ServiceError> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("secret generation: {e:?}")))?;

        let totp = TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret_bytes,
            Some(self.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("totp init: {e}")))?;

        Ok(TotpSetup {
            secret: totp.get_secret_base32(),
            provisioning_uri: totp.get_url(),
        })
    }

    /// Check a code against the current time step, ±2 steps of drift.
    /// Malformed secrets validate as false rather than erroring.
    pub fn validate_code(&self, secret_base32: &str, code: &str) -> bool {
        match self.build(secret_base32) {
            Some(totp) => totp.check_current(code.trim()).unwrap_or(false),
            None => false,
        }
    }

    /// Check a code at an explicit Unix timestamp. Same window as
    /// [`validate_code`](Self::validate_code).
    pub fn validate_code_at(&self, secret_base32: &str, code: &str, time: u64) -> bool {
        match self.build(secret_base32) {
            Some(totp) => totp.check(code.trim(), time),
            None => false,
        }
    }

    /// The valid code for an explicit Unix timestamp.
    pub fn code_at(&self, secret_base32: &str, time: u64) -> Option<String> {
        self.build(secret_base32).map(|totp| totp.generate(time))
    }

    fn build(&self, secret_base32: &str) -> Option<TOTP> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string()).to_bytes().ok()?;
        if secret_bytes.len() < 16 {
            return None;
        }
        Some(TOTP::new_unchecked(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret_bytes,
            Some(self.issuer.clone()),
            String::new(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TotpEngine {
        TotpEngine::new("identity-service")
    }

    #[test]
    fn setup_produces_base32_secret_and_uri() {
        let setup = engine().generate_setup("alice@example.com").expect("setup");

        // 160-bit secret -> 32 base32 characters.
        assert_eq!(setup.secret.len(), 32);
        assert!(setup.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(setup.provisioning_uri.contains("issuer=identity-service"));
        assert!(setup.provisioning_uri.contains("alice%40example.com"));
    }

    #[test]
    fn each_setup_gets_a_distinct_secret() {
        let e = engine();
        let a = e.generate_setup("a@example.com").unwrap();
        let b = e.generate_setup("b@example.com").unwrap();
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn code_validates_within_two_steps_of_drift() {
        let e = engine();
        let setup = e.generate_setup("drift@example.com").unwrap();
        let now = 1_700_000_000u64;

        let code = e.code_at(&setup.secret, now).unwrap();

        assert!(e.validate_code_at(&setup.secret, &code, now));
        assert!(e.validate_code_at(&setup.secret, &code, now - 60));
        assert!(e.validate_code_at(&setup.secret, &code, now + 60));
    }

    #[test]
    fn code_fails_beyond_the_window() {
        let e = engine();
        let setup = e.generate_setup("drift@example.com").unwrap();
        let now = 1_700_000_000u64;

        let code = e.code_at(&setup.secret, now).unwrap();

        assert!(!e.validate_code_at(&setup.secret, &code, now - 120));
        assert!(!e.validate_code_at(&setup.secret, &code, now + 120));
    }

    #[test]
    fn wrong_code_fails() {
        let e = engine();
        let setup = e.generate_setup("x@example.com").unwrap();
        assert!(!e.validate_code(&setup.secret, "000000"));
    }

    #[test]
    fn code_is_trimmed_before_checking() {
        let e = engine();
        let setup = e.generate_setup("x@example.com").unwrap();
        let now = 1_700_000_000u64;
        let code = e.code_at(&setup.secret, now).unwrap();

        assert!(e.validate_code_at(&setup.secret, &format!(" {code} "), now));
    }

    #[test]
    fn garbage_secret_validates_as_false() {
        let e = engine();
        assert!(!e.validate_code("not base32 at all!!!", "123456"));
        assert!(!e.validate_code("", "123456"));
    }
}
