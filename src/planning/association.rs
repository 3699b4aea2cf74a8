use serde::{Deserialize, Serialize};

pub const AUTO_CREATED_DESCRIPTION: &str = "auto-created";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub description: Option<String>,
}

impl Association {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            description: None,
        }
    }

    /// The association implicitly created when an invitation targets a bare
    /// email address that matches no existing association name.
    pub fn auto_created(id: i64, email: &str) -> Self {
        Self {
            id,
            name: email.to_string(),
            email: Some(email.to_string()),
            description: Some(AUTO_CREATED_DESCRIPTION.to_string()),
        }
    }

    pub fn is_auto_created(&self) -> bool {
        self.description.as_deref() == Some(AUTO_CREATED_DESCRIPTION)
    }
}
