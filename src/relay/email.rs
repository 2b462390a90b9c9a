//! Notification email composition.
//!
//! The HTML body is a Tera template registered under an `.html` name, so
//! every submitted value is autoescaped on render.

use serde::Serialize;
use std::sync::LazyLock;
use tera::{Context, Tera};

use crate::config::EmailConfig;
use crate::relay::submission::ContactSubmission;

const NOTIFICATION: &str = "contact_notification.html";
const NOTIFICATION_TEMPLATE: &str = include_str!("templates/contact_notification.html");

static TEMPLATES: LazyLock<Tera> = LazyLock::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template(NOTIFICATION, NOTIFICATION_TEMPLATE)
        .expect("notification template parses");
    tera
});

/// A fully addressed message ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
}

/// Values the notification template sees.
#[derive(Debug, Serialize)]
struct NotificationContext<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
}

impl OutgoingEmail {
    /// Address and render the notification for a submission.
    ///
    /// Without a configured recipient the message goes back to the
    /// submitter, which is only useful with a provider sandbox sender.
    pub fn compose(
        submission: &ContactSubmission,
        config: &EmailConfig,
    ) -> Result<Self, tera::Error> {
        Ok(Self {
            from: config.from_address.clone(),
            to: config
                .to_address
                .clone()
                .unwrap_or_else(|| submission.email.clone()),
            reply_to: submission.email.clone(),
            subject: format!("New Contact Form Message from {}", submission.name),
            html: render_html(submission)?,
        })
    }
}

fn render_html(submission: &ContactSubmission) -> Result<String, tera::Error> {
    let context = Context::from_serialize(NotificationContext {
        name: &submission.name,
        email: &submission.email,
        message: &submission.message,
    })?;
    TEMPLATES.render(NOTIFICATION, &context)
}
