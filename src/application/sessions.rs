//! Loaded carts by session id

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::cart_store::CartStore;
use crate::config::CartSettings;
use crate::ports::KeyValueStore;
use crate::{Result, StorefrontError};

pub type SharedCart = Arc<Mutex<CartStore>>;

const MAX_SESSION_LEN: usize = 128;

struct Entry { cart: SharedCart, last_used: Instant }

/// Keeps at most `max_sessions` carts loaded. Carts nobody holds are evicted
/// least-recently-used first; their state stays in the key-value store.
pub struct SessionRegistry {
    store: Arc<dyn KeyValueStore>,
    settings: CartSettings,
    carts: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, settings: CartSettings) -> Self {
        Self { store, settings, carts: Mutex::new(HashMap::new()) }
    }

    pub fn settings(&self) -> &CartSettings { &self.settings }

    /// Returns the session's cart, loading it from storage on first use.
    pub async fn open(&self, session: &str) -> Result<SharedCart> {
        validate_session(session)?;
        if let Some(entry) = self.carts.lock().await.get_mut(session) {
            entry.last_used = Instant::now();
            return Ok(entry.cart.clone());
        }

        // Storage I/O happens without the map lock; a concurrent loader of the same session loses the insert.
        let loaded = CartStore::load(session, self.store.clone(), &self.settings).await?;
        let mut carts = self.carts.lock().await;
        if !carts.contains_key(session) && carts.len() >= self.settings.max_sessions {
            evict_idle(&mut carts, self.settings.max_sessions - 1);
        }
        let entry = carts
            .entry(session.to_string())
            .or_insert_with(|| Entry { cart: Arc::new(Mutex::new(loaded)), last_used: Instant::now() });
        entry.last_used = Instant::now();
        let cart = entry.cart.clone();
        info!(session, sessions = carts.len(), "cart session opened");
        Ok(cart)
    }

    pub async fn len(&self) -> usize { self.carts.lock().await.len() }
    pub async fn is_empty(&self) -> bool { self.carts.lock().await.is_empty() }
}

fn evict_idle(carts: &mut HashMap<String, Entry>, target: usize) {
    let mut idle: Vec<(Instant, String)> = carts
        .iter()
        .filter(|(_, e)| Arc::strong_count(&e.cart) == 1)
        .map(|(k, e)| (e.last_used, k.clone()))
        .collect();
    idle.sort();
    let excess = carts.len().saturating_sub(target);
    for (_, key) in idle.into_iter().take(excess) {
        carts.remove(&key);
    }
    debug!(sessions = carts.len(), "evicted idle cart sessions");
}

fn validate_session(session: &str) -> Result<()> {
    let valid = !session.is_empty()
        && session.len() <= MAX_SESSION_LEN
        && session.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid { Ok(()) } else { Err(StorefrontError::InvalidSession(session.chars().take(MAX_SESSION_LEN).collect())) }
}
