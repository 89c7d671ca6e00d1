pub mod account;
pub mod audit;
pub mod invitation;
pub mod password_reset;
pub mod person;
pub mod rate_limit;
pub mod refresh_token;
pub mod role;

pub use account::AccountRepository;
pub use audit::AuthEventRepository;
pub use invitation::InvitationRepository;
pub use password_reset::PasswordResetRepository;
pub use person::PersonRepository;
pub use rate_limit::RateLimitRepository;
pub use refresh_token::RefreshTokenRepository;
pub use role::{AccountRoleRepository, PermissionRepository, RoleRepository};
