//! SSO resolver: OAuth2 authorization-code client against a closed set of
//! third-party identity providers.
//!
//! The provider table is an explicit registry built once at startup from
//! configured credentials; an unknown name is `UnsupportedProvider` before
//! any network traffic happens. Resolution order for a provider identity:
//! exact (provider, subject) match, then email linking onto an existing
//! account, then a brand-new individual account.

use rand::{rngs::OsRng, RngCore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SsoConfig;
use crate::models::{Account, AuditEvent};
use crate::services::error::ServiceError;
use crate::services::login::{LoginOutcome, LoginService};
use crate::storage::IdentityStore;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// What a provider tells us about the user, normalized across providers.
#[derive(Debug, Clone)]
pub struct SsoUserInfo {
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

type UserInfoMapper = fn(&Value) -> Result<SsoUserInfo, ServiceError>;

/// Static description of one OAuth2 provider.
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub userinfo_url: &'static str,
    /// Pre-encoded scope string for the authorize URL.
    pub scope: &'static str,
    map_user: UserInfoMapper,
}

struct RegisteredProvider {
    descriptor: ProviderDescriptor,
    client_id: String,
    client_secret: String,
}

/// The closed set of providers this deployment can talk to.
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    /// Build the registry from configured credentials. Providers without
    /// credentials simply do not exist as far as callers are concerned.
    pub fn from_config(config: &SsoConfig) -> Self {
        let mut providers = Vec::new();

        if let Some(google) = &config.google {
            providers.push(RegisteredProvider {
                descriptor: ProviderDescriptor {
                    name: "google",
                    authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
                    token_url: "https://oauth2.googleapis.com/token",
                    userinfo_url: "https://www.googleapis.com/userinfo/v2/me",
                    scope: "email%20profile",
                    map_user: map_google_user,
                },
                client_id: google.client_id.clone(),
                client_secret: google.client_secret.clone(),
            });
        }

        if let Some(github) = &config.github {
            providers.push(RegisteredProvider {
                descriptor: ProviderDescriptor {
                    name: "github",
                    authorize_url: "https://github.com/login/oauth/authorize",
                    token_url: "https://github.com/login/oauth/access_token",
                    userinfo_url: "https://api.github.com/user",
                    scope: "user%3Aemail",
                    map_user: map_github_user,
                },
                client_id: github.client_id.clone(),
                client_secret: github.client_secret.clone(),
            });
        }

        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.descriptor.name).collect()
    }

    fn get(&self, name: &str) -> Result<&RegisteredProvider, ServiceError> {
        let name = name.to_lowercase();
        self.providers
            .iter()
            .find(|p| p.descriptor.name == name)
            .ok_or(ServiceError::UnsupportedProvider(name))
    }
}

#[derive(Clone)]
pub struct SsoResolver {
    registry: Arc<ProviderRegistry>,
    http: reqwest::Client,
    callback_base_url: String,
    store: Arc<dyn IdentityStore>,
    login: LoginService,
}

impl SsoResolver {
    pub fn new(
        config: &SsoConfig,
        store: Arc<dyn IdentityStore>,
        login: LoginService,
    ) -> Result<Self, ServiceError> {
        let registry = Arc::new(ProviderRegistry::from_config(config));
        tracing::info!(providers = ?registry.provider_names(), "SSO registry initialized");

        // A hung provider must not pin request workers; fail closed instead.
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("http client: {e}")))?;

        Ok(Self {
            registry,
            http,
            callback_base_url: config.callback_base_url.clone(),
            store,
            login,
        })
    }

    /// Build the provider's authorization URL for the frontend to redirect
    /// the user to.
    pub fn authorize_url(&self, provider: &str) -> Result<String, ServiceError> {
        let registered = self.registry.get(provider)?;
        let descriptor = &registered.descriptor;

        let callback = self.callback_url(descriptor.name);
        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            descriptor.authorize_url,
            registered.client_id,
            urlencoding::encode(&callback),
            descriptor.scope,
        ))
    }

    /// Exchange the callback code for a provider identity, resolve it to a
    /// local account and hand off to the login orchestrator's
    /// post-credential step.
    pub async fn callback(
        &self,
        provider: &str,
        code: &str,
    ) -> Result<LoginOutcome, ServiceError> {
        let registered = self.registry.get(provider)?;
        let user_info = self.fetch_user_info(registered, code).await?;
        let account = self
            .resolve_account(registered.descriptor.name, &user_info)
            .await?;

        tracing::info!(
            account_id = %account.account_id,
            provider = registered.descriptor.name,
            "SSO login"
        );

        self.login.post_credential(&account).await
    }

    /// Map a provider identity onto a local account: subject match first,
    /// then email linking, then account creation. Pure store logic, kept
    /// separate from the HTTP exchange so it is testable with synthetic
    /// provider responses.
    pub async fn resolve_account(
        &self,
        provider: &str,
        user_info: &SsoUserInfo,
    ) -> Result<Account, ServiceError> {
        if let Some(account) = self
            .store
            .account_by_sso(provider, &user_info.subject)
            .await?
        {
            return Ok(account);
        }

        // Same verified email means the same person: link rather than
        // create a duplicate.
        if let Some(mut account) = self.store.account_by_email(&user_info.email).await? {
            self.store
                .link_sso_identity(account.account_id, provider, &user_info.subject)
                .await?;
            account.sso_provider = Some(provider.to_string());
            account.sso_subject = Some(user_info.subject.clone());

            self.login.dispatch_audit(AuditEvent::new(
                account.account_id,
                "account.sso_linked",
                "Account",
                Some(account.account_id),
            ));

            return Ok(account);
        }

        let base = user_info
            .display_name
            .clone()
            .unwrap_or_else(|| local_part(&user_info.email).to_string());
        let username = self.generate_unique_username(&base).await?;

        let mut account = Account::new(user_info.email.clone(), username, None);
        account.first_name = user_info.first_name.clone();
        account.last_name = user_info.last_name.clone();
        account.avatar_url = user_info.avatar_url.clone();
        account.sso_provider = Some(provider.to_string());
        account.sso_subject = Some(user_info.subject.clone());

        self.store.insert_account(&account).await?;

        self.login.dispatch_audit(AuditEvent::new(
            account.account_id,
            "account.sso_registered",
            "Account",
            Some(account.account_id),
        ));

        Ok(account)
    }

    async fn fetch_user_info(
        &self,
        registered: &RegisteredProvider,
        code: &str,
    ) -> Result<SsoUserInfo, ServiceError> {
        let descriptor = &registered.descriptor;
        let callback = self.callback_url(descriptor.name);

        let token_response = self
            .http
            .post(descriptor.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", registered.client_id.as_str()),
                ("client_secret", registered.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", callback.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = descriptor.name, "code exchange failed");
                ServiceError::ProviderError("code exchange failed".into())
            })?;

        if !token_response.status().is_success() {
            tracing::error!(
                status = %token_response.status(),
                provider = descriptor.name,
                "code exchange rejected"
            );
            return Err(ServiceError::ProviderError("code exchange failed".into()));
        }

        let token_body: Value = token_response
            .json()
            .await
            .map_err(|_| ServiceError::ProviderError("malformed token response".into()))?;
        let access_token = token_body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::ProviderError("no access token in response".into()))?;

        let userinfo_response = self
            .http
            .get(descriptor.userinfo_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, "identity-service")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = descriptor.name, "userinfo fetch failed");
                ServiceError::ProviderError("userinfo fetch failed".into())
            })?;

        let user_body: Value = userinfo_response
            .json()
            .await
            .map_err(|_| ServiceError::ProviderError("malformed userinfo response".into()))?;

        (descriptor.map_user)(&user_body)
    }

    /// Derive a unique username from the provider's display name or the
    /// email local-part: numeric suffixes first, a random one as last
    /// resort.
    async fn generate_unique_username(&self, base: &str) -> Result<String, ServiceError> {
        let mut candidate: String = base
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if candidate.is_empty() {
            candidate = "user".to_string();
        }

        if self.store.account_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }

        for i in 1..100 {
            let attempt = format!("{candidate}{i}");
            if self.store.account_by_username(&attempt).await?.is_none() {
                return Ok(attempt);
            }
        }

        let mut bytes = [0u8; 3];
        OsRng.fill_bytes(&mut bytes);
        Ok(format!("{candidate}{}", hex::encode(bytes)))
    }

    fn callback_url(&self, provider: &str) -> String {
        format!("{}/sso/{}/callback", self.callback_base_url, provider)
    }
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn map_google_user(data: &Value) -> Result<SsoUserInfo, ServiceError> {
    let subject = data
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::ProviderError("missing subject in userinfo".into()))?;
    let email = data
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::ProviderError("provider account has no usable email".into()))?;

    Ok(SsoUserInfo {
        subject,
        email,
        display_name: string_field(data, "name"),
        first_name: string_field(data, "given_name"),
        last_name: string_field(data, "family_name"),
        avatar_url: string_field(data, "picture"),
    })
}

fn map_github_user(data: &Value) -> Result<SsoUserInfo, ServiceError> {
    // GitHub subjects are numeric in JSON.
    let subject = match data.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ServiceError::ProviderError("missing subject in userinfo".into())),
    };
    let email = data
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::ProviderError("provider account has no usable email".into()))?;

    Ok(SsoUserInfo {
        subject,
        email,
        display_name: string_field(data, "name"),
        first_name: None,
        last_name: None,
        avatar_url: string_field(data, "avatar_url"),
    })
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_mapper_requires_email() {
        let data = serde_json::json!({ "id": "123", "name": "No Email" });
        assert!(matches!(
            map_google_user(&data),
            Err(ServiceError::ProviderError(_))
        ));
    }

    #[test]
    fn github_mapper_accepts_numeric_subject() {
        let data = serde_json::json!({
            "id": 998877,
            "email": "dev@example.com",
            "name": "Dev",
            "avatar_url": "https://example.com/a.png"
        });
        let info = map_github_user(&data).expect("map");
        assert_eq!(info.subject, "998877");
        assert_eq!(info.email, "dev@example.com");
        assert_eq!(info.avatar_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn github_mapper_requires_public_email() {
        let data = serde_json::json!({ "id": 1, "email": null });
        assert!(matches!(
            map_github_user(&data),
            Err(ServiceError::ProviderError(_))
        ));
    }
}
