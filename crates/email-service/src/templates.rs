//! Tera template loading (C5 rendering step), shared by the SMTP transport and any future
//! transport that needs the same HTML bodies.
use domain::errors::EmailError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tera::{Context as TeraContext, Tera, Value};

pub static TERA: Lazy<Tera> = Lazy::new(|| {
    let mut tera = match Tera::new("crates/email-service/src/templates/**/*.html") {
        Ok(t) => t,
        Err(_) => match Tera::new("src/templates/**/*.html") {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("failed to load email templates: {}", e);
                Tera::default()
            }
        },
    };

    tera.register_filter(
        "safe_html",
        |value: &Value, _args: &HashMap<String, Value>| {
            let s = value.as_str().unwrap_or_default().replace('\n', "<br>");
            Ok(serde_json::to_value(htmlescape::encode_minimal(&s)).unwrap())
        },
    );
    tera
});

pub fn render(template: &str, content: &HashMap<String, String>) -> Result<String, EmailError> {
    let mut ctx = TeraContext::new();
    for (key, value) in content {
        ctx.insert(key, value);
    }
    TERA.render(template, &ctx)
        .map_err(|e| EmailError::Render(format!("{}: {}", template, e)))
}
