pub mod audit;
pub mod email;
pub mod error;
pub mod login;
pub mod org;
pub mod rbac;
pub mod reset;
pub mod session;
pub mod sso;
pub mod token;
pub mod totp;

pub use audit::{AuditSink, RecordingAuditSink, TracingAuditSink};
pub use email::{EmailProvider, RecordingMailer, SmtpEmailService};
pub use error::ServiceError;
pub use login::{LoginOutcome, LoginService};
pub use org::OrgService;
pub use rbac::{RbacResolver, ROLE_ADMIN, ROLE_EMPLOYEE};
pub use reset::PasswordResetService;
pub use session::SessionLedger;
pub use sso::{ProviderRegistry, SsoResolver, SsoUserInfo};
pub use token::{AccessClaims, ChallengeClaims, TokenIssuer};
pub use totp::{TotpEngine, TotpSetup};
