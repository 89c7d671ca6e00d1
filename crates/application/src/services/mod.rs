pub mod invitation_service;
pub mod password_reset_service;
pub mod session_service;

pub use invitation_service::InvitationService;
pub use password_reset_service::PasswordResetService;
pub use session_service::SessionService;
