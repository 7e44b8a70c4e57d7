use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

pub const WRONG_PIN_MESSAGE: &str = "Clave incorrecta. Intenta nuevamente.";

const ACCESS_FLAG: &str = "pin_access";

/// Key-value flag persistence the host environment provides. The service
/// ships an in-memory implementation; a browser host would back this
/// with its local storage.
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> bool;
    fn set(&self, key: &str, value: bool);
}

#[derive(Debug, Default)]
pub struct InMemoryFlagStore {
    flags: Mutex<HashMap<String, bool>>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for InMemoryFlagStore {
    fn get(&self, key: &str) -> bool {
        self.flags
            .lock()
            .map(|flags| flags.get(key).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    fn set(&self, key: &str, value: bool) {
        match self.flags.lock() {
            Ok(mut flags) => {
                flags.insert(key.to_string(), value);
            }
            Err(e) => warn!("Failed to persist access flag: {}", e),
        }
    }
}

/// Shared-PIN gate for the admin and history panels. A correct code sets
/// a persistent flag that bypasses the prompt on later visits. This is a
/// UX speed-bump, not an authentication boundary.
pub struct AccessGate {
    pin: String,
    store: Box<dyn FlagStore>,
}

impl AccessGate {
    pub fn new(pin: impl Into<String>, store: Box<dyn FlagStore>) -> Self {
        Self {
            pin: pin.into(),
            store,
        }
    }

    /// Compare the candidate against the configured code; success is
    /// remembered through the flag store.
    pub fn verify(&self, candidate: &str) -> bool {
        if candidate == self.pin {
            self.store.set(ACCESS_FLAG, true);
            info!("Access code accepted, persistent access granted");
            true
        } else {
            false
        }
    }

    pub fn has_persistent_access(&self) -> bool {
        self.store.get(ACCESS_FLAG)
    }
}
