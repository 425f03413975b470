pub mod account;
pub mod audit_event;
pub mod invitation;
pub mod organization;
pub mod password_reset;
pub mod role;
pub mod session;

pub use account::{Account, AccountResponse, AccountType};
pub use audit_event::AuditEvent;
pub use invitation::{Invitation, InvitationState};
pub use organization::Organization;
pub use password_reset::PasswordResetToken;
pub use role::{Role, RoleAssignment};
pub use session::Session;
