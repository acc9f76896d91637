use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One discovered form input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormInput {
    pub name: String,
    pub input_type: String,
    pub required: bool,
}

/// A form found on a surveyed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredForm {
    /// Absolute submission target.
    pub action: String,
    pub method: String,
    pub inputs: Vec<FormInput>,
    pub selector: String,
}

/// Everything learned from fetching one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSurvey {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub response_time: Duration,
    /// Absolute same-site link targets.
    pub links_found: Vec<String>,
    pub forms_found: Vec<DiscoveredForm>,
    pub error: Option<String>,
}

impl PageSurvey {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            content_type: None,
            response_time: Duration::from_secs(0),
            links_found: Vec::new(),
            forms_found: Vec::new(),
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url)
        }
    }
}
