//! `console-api-client` is the resilient request client behind the admin
//! console. Every page funnels its API calls through [`ApiClient`]:
//! - [`ApiClient::send`] and the typed [`ApiClient::get`], [`ApiClient::post`],
//!   [`ApiClient::put`], [`ApiClient::delete`] helpers
//! - [`SessionGuard`] to react to 401s in one place
//! - [`ProgressNotifier`] to show "reconnecting" feedback while a cold
//!   backend wakes up

mod client;
mod decode;
mod error;
mod options;
mod progress;
mod retry;
mod session;
mod token;
mod wait;

pub use client::{ApiClient, ApiRequest};
pub use error::ApiError;
pub use options::ClientOptions;
pub use progress::{ProgressNotifier, RetryStatus, Subscription};
pub use retry::{is_retryable_status, RetryPolicy};
pub use session::{SessionGuard, UnauthorizedHandler};
pub use token::{MemoryTokenStore, StoredToken, TokenProvider, TokenStore, DEFAULT_TOKEN_KEY};

pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, ApiError>;
