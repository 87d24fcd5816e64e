//! Winner and admin notification bodies for a prize record.

use minijinja::{Environment, Value, context};

use prize_common::config::AppConfig;
use prize_common::types::PrizeRecord;

use crate::error::{DeliveryError, DeliveryErrorCode};
use crate::message::{EmailMessage, Sender};

const WINNER_HTML: &str = include_str!("../templates/winner.html");
const WINNER_TEXT: &str = include_str!("../templates/winner.txt");
const ADMIN_HTML: &str = include_str!("../templates/admin.html");
const ADMIN_TEXT: &str = include_str!("../templates/admin.txt");

#[derive(Debug, Clone)]
pub struct NotificationComposer {
    sender: Sender,
    admin_email: String,
}

impl NotificationComposer {
    pub fn new(sender: Sender, admin_email: impl Into<String>) -> Self {
        Self {
            sender,
            admin_email: admin_email.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Sender::new(config.email_from_name.clone(), config.email_from.clone()),
            config.admin_email.clone(),
        )
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Build the (winner, admin) pair. Output depends only on the record.
    pub fn compose(&self, record: &PrizeRecord) -> Result<(EmailMessage, EmailMessage), DeliveryError> {
        Ok((self.winner_message(record)?, self.admin_message(record)?))
    }

    fn winner_message(&self, record: &PrizeRecord) -> Result<EmailMessage, DeliveryError> {
        let ctx = context! {
            brand => &self.sender.name,
            prize => &record.prize,
            date => &record.registered_at_display,
        };

        Ok(EmailMessage {
            from: self.sender.clone(),
            to: record.email.clone(),
            subject: format!("🎉 ¡Felicidades! Has ganado un premio en {}", self.sender.name),
            html: render("winner.html", WINNER_HTML, &ctx)?,
            text: Some(render("winner.txt", WINNER_TEXT, &ctx)?),
        })
    }

    fn admin_message(&self, record: &PrizeRecord) -> Result<EmailMessage, DeliveryError> {
        let ctx = context! {
            email => &record.email,
            prize => &record.prize,
            date => &record.registered_at_display,
        };

        Ok(EmailMessage {
            from: self.sender.clone(),
            to: self.admin_email.clone(),
            subject: format!("📊 Nuevo premio otorgado - {}", self.sender.name),
            html: render("admin.html", ADMIN_HTML, &ctx)?,
            text: Some(render("admin.txt", ADMIN_TEXT, &ctx)?),
        })
    }
}

/// Render one body. Names ending in `.html` are auto-escaped.
fn render(name: &'static str, source: &'static str, ctx: &Value) -> Result<String, DeliveryError> {
    let mut env = Environment::new();
    env.add_template(name, source)
        .map_err(|e| template_error(name, e))?;
    env.get_template(name)
        .and_then(|tmpl| tmpl.render(ctx))
        .map_err(|e| template_error(name, e))
}

fn template_error(name: &str, err: minijinja::Error) -> DeliveryError {
    DeliveryError::new(
        DeliveryErrorCode::InvalidMessage,
        format!("template {} failed: {}", name, err),
    )
}
