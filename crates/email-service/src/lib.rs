pub mod config;
pub mod dispatcher;
pub mod templates;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::EmailConfig;
pub use dispatcher::Dispatcher;
pub use transport::SmtpTransport;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
