//! Static page for signed-in users without operator access.

use crate::contact::ContactLink;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProgressStep {
    pub label: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WaitingPage {
    pub title: String,
    pub subtitle: String,
    pub status: String,
    pub steps: Vec<ProgressStep>,
    pub contact_label: String,
    pub contact_url: String,
    pub footer: String,
}

impl WaitingPage {
    pub fn new(contact: &ContactLink) -> Self {
        let step = |label: &str, done: bool| ProgressStep {
            label: label.to_string(),
            done,
        };
        Self {
            title: "Internet Lines Management".to_string(),
            subtitle: "Your account is ready".to_string(),
            status: "The system is under development. Access will open soon.".to_string(),
            steps: vec![
                step("Account created", true),
                step("Email confirmed", true),
                step("Access granted by the administrator", false),
            ],
            contact_label: "Contact us on WhatsApp".to_string(),
            contact_url: contact.url().to_string(),
            footer: "Thank you for your patience".to_string(),
        }
    }
}
