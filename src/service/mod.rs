// ============================================================================
// Services
// ============================================================================

pub mod member;

pub use member::{MemberService, REGISTRATION_URL};
