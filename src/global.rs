//! Process-wide default client.
//!
//! Most applications hold exactly one session to the collector. This
//! module stores that instance so call sites do not have to thread a
//! [`Client`] through every layer. Independent clients remain fully
//! constructible; nothing here is required.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::client::Client;

static INSTANCE: Lazy<RwLock<Option<Arc<Client>>>> = Lazy::new(|| RwLock::new(None));

/// Install `client` as the process-wide default, replacing any previous
/// one, and return a handle to it.
pub fn install(client: Client) -> Arc<Client> {
    let client = Arc::new(client);
    *INSTANCE.write() = Some(Arc::clone(&client));
    client
}

/// The installed default client, if any.
pub fn instance() -> Option<Arc<Client>> {
    INSTANCE.read().clone()
}

/// Remove and return the default client. Its session disconnects when
/// the last outstanding handle drops.
pub fn uninstall() -> Option<Arc<Client>> {
    INSTANCE.write().take()
}
