use serde::Deserialize;

/// SMTP transport configuration, loaded independently of the dispatcher's retry policy
/// (that lives on `application::config::AuthConfig` since it's a property of the calling
/// services, not of the transport itself).
#[derive(Deserialize, Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from_email: String,
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("EMAIL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        cfg.try_deserialize()
    }
}
