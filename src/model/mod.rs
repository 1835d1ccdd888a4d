// ============================================================================
// Domain Model
// ============================================================================

pub mod member;
pub mod registration;

pub use member::{Member, MemberPatch};
pub use registration::{Identity, RegistrationData, RegistrationDetails, RegistrationStatus};
