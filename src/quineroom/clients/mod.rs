//! Backend [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations and the
//! process-wide client handle.
//!
//! The remote client (credentials, base URL, pooled transport) is initialised once at startup
//! through [`init_client`]; every [`ModelAgent`](crate::ModelAgent) then receives it by
//! injection instead of looking it up at call time.

pub mod common;
pub mod openai;

use once_cell::sync::OnceCell;
use std::sync::Arc;

pub use crate::quineroom::config::ClientConfig;
use crate::quineroom::config::ConfigError;
use openai::OpenAIClient;

static SHARED_CLIENT: OnceCell<Arc<OpenAIClient>> = OnceCell::new();

/// Build the process-wide backend client. Fails if the transport cannot be built or if a
/// client was already initialised.
pub fn init_client(config: ClientConfig) -> Result<Arc<OpenAIClient>, ConfigError> {
    let client = Arc::new(OpenAIClient::new(config)?);
    SHARED_CLIENT
        .set(Arc::clone(&client))
        .map_err(|_| ConfigError::ClientAlreadyInitialized)?;
    log::info!("Backend client initialised for {}", client.base_url());
    Ok(client)
}

/// The client created by [`init_client`], if any.
pub fn shared_client() -> Option<Arc<OpenAIClient>> {
    SHARED_CLIENT.get().cloned()
}
