use serde::Serialize;

/// Display name and address a message is sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub name: String,
    pub address: String,
}

impl Sender {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" <{}>", self.name.replace('"', ""), self.address)
    }
}

/// Provider-agnostic email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: Sender,
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Plain-text alternative; providers fall back to the subject when absent.
    pub text: Option<String>,
}

impl EmailMessage {
    /// Plain-text body, or the subject if none was composed.
    pub fn text_or_subject(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.subject)
    }
}
