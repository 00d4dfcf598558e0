//! Provider-facing clients.
//!
//! Everything that talks to a chat-completion provider lives here: the
//! translation client, the model discovery client, and the static catalog
//! of provider shortcuts. All network access in the application funnels
//! through these two clients, and only the coordinator drives them.

pub mod catalog;
pub mod discovery;
pub mod translate;

pub use discovery::{DiscoveryClient, ModelDescriptor, normalize_models};
pub use translate::{TranslationClient, TranslationResult, UsageFrequency};

use std::time::Duration;

/// Default timeout for provider API requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Join an endpoint suffix onto a base URL, tolerating a trailing slash.
pub(crate) fn endpoint_url(base_url: &str, suffix: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}{}", base_url, suffix)
    } else {
        format!("{}/{}", base_url, suffix)
    }
}
