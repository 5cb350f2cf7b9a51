use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Tells an async completion whether the view that started it is still mounted.
#[derive(Clone, Debug)]
pub struct LivenessToken {
    pub view_id: String,
    alive: Arc<Mutex<bool>>,
}

impl LivenessToken {
    pub fn new(view_id: String) -> Self {
        Self {
            view_id,
            alive: Arc::new(Mutex::new(true)),
        }
    }

    pub fn revoke(&self) {
        *self.alive.lock() = false;
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.lock()
    }
}

/// Tokens for the currently mounted views, keyed by view id.
#[derive(Default)]
pub struct LivenessRegistry {
    tokens: HashMap<String, LivenessToken>,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounting an id again revokes the token handed out for the previous mount.
    pub fn mount(&mut self, view_id: &str) -> LivenessToken {
        let token = LivenessToken::new(view_id.to_string());
        if let Some(previous) = self.tokens.insert(view_id.to_string(), token.clone()) {
            previous.revoke();
        }
        token
    }

    pub fn unmount(&mut self, view_id: &str) -> bool {
        match self.tokens.remove(view_id) {
            Some(token) => {
                token.revoke();
                true
            }
            None => false,
        }
    }

    pub fn token(&self, view_id: &str) -> Option<&LivenessToken> {
        self.tokens.get(view_id)
    }

    pub fn mounted_views(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tokens.keys().cloned().collect();
        ids.sort();
        ids
    }
}
