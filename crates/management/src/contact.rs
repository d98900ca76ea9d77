//! Prefilled chat deep link for reaching the operator.

use lines_core::config::ContactConfig;
use lines_core::{LinesError, LinesResult};
use url::Url;

const CHAT_BASE: &str = "https://wa.me/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLink {
    url: Url,
}

impl ContactLink {
    pub fn new(phone_number: &str, message: &str) -> LinesResult<Self> {
        let phone = phone_number.trim().trim_start_matches('+');
        if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(LinesError::Config(format!("invalid contact phone number '{phone_number}'")));
        }
        let mut url = Url::parse(CHAT_BASE)
            .and_then(|base| base.join(phone))
            .map_err(|e| LinesError::Config(e.to_string()))?;
        url.query_pairs_mut().append_pair("text", message);
        Ok(Self { url })
    }

    pub fn from_config(config: &ContactConfig) -> LinesResult<Self> {
        Self::new(&config.phone_number, &config.message)
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}
