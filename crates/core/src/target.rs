use serde::{Deserialize, Serialize};

/// An external sink that receives a job's terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifyTarget {
    /// HTTP POST of `{job_id, state, result}` to `url`.
    Webhook { url: String },
    /// Publish the terminal state name under `key` in a key/value store.
    KeyValue { key: String },
}

impl NotifyTarget {
    pub fn webhook(url: impl Into<String>) -> Self {
        Self::Webhook { url: url.into() }
    }

    pub fn key_value(key: impl Into<String>) -> Self {
        Self::KeyValue { key: key.into() }
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Webhook { url } => format!("webhook:{url}"),
            Self::KeyValue { key } => format!("kv:{key}"),
        }
    }
}
