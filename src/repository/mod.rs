// ============================================================================
// Repositories
// ============================================================================

pub mod member;

pub use member::MemberRepo;
