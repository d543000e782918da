use handlebars::{Handlebars, RenderError, TemplateError};
use serde_json::json;

const LAYOUT: &str = include_str!("templates/layout.html");
const DIGEST: &str = include_str!("templates/digest.html");
const WELCOME: &str = include_str!("templates/welcome.html");

pub const DIGEST_TEMPLATE: &str = "digest";
pub const WELCOME_TEMPLATE: &str = "welcome";

/// HTML email templates sharing the branded layout. Every `{{value}}`
/// interpolation is HTML-escaped by the engine.
pub struct MailTemplates {
    registry: Handlebars<'static>,
    app_url: String,
}

impl MailTemplates {
    pub fn new(app_url: String) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();

        registry.register_partial("layout", LAYOUT)?;
        registry.register_template_string(DIGEST_TEMPLATE, DIGEST)?;
        registry.register_template_string(WELCOME_TEMPLATE, WELCOME)?;

        Ok(Self { registry, app_url })
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    /// Renders `template` with `data`; `title` and `app_url` are always available.
    pub fn render(
        &self,
        template: &str,
        title: &str,
        mut data: serde_json::Value,
    ) -> Result<String, RenderError> {
        if let Some(fields) = data.as_object_mut() {
            fields.insert("title".into(), json!(title));
            fields.insert("app_url".into(), json!(self.app_url));
        }

        self.registry.render(template, &data)
    }

    pub fn render_welcome(&self) -> Result<String, RenderError> {
        self.render(WELCOME_TEMPLATE, "Inscription confirmée !", json!({}))
    }
}
