use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::MirrorError;

/// Durable key/value storage that survives a page reload.
pub trait LocalMirror {
    fn read(&self, key: &str) -> Result<Option<String>, MirrorError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), MirrorError>;
    fn remove(&mut self, key: &str) -> Result<(), MirrorError>;
}

/// In-process mirror. Clones share the same map, so a test can keep one
/// handle and inspect what the store wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryMirror {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl LocalMirror for MemoryMirror {
    fn read(&self, key: &str) -> Result<Option<String>, MirrorError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MirrorError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), MirrorError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStorageMirror;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::LocalMirror;
    use crate::error::MirrorError;

    /// `window.localStorage`.
    #[derive(Debug, Default)]
    pub struct BrowserStorageMirror;

    fn local_storage() -> Result<web_sys::Storage, MirrorError> {
        let window = web_sys::window().ok_or(MirrorError::Unavailable)?;
        window
            .local_storage()
            .map_err(|e| MirrorError::Io(format!("localStorage access failed: {:?}", e)))?
            .ok_or(MirrorError::Unavailable)
    }

    impl LocalMirror for BrowserStorageMirror {
        fn read(&self, key: &str) -> Result<Option<String>, MirrorError> {
            local_storage()?
                .get_item(key)
                .map_err(|e| MirrorError::Io(format!("get_item({}) failed: {:?}", key, e)))
        }

        fn write(&mut self, key: &str, value: &str) -> Result<(), MirrorError> {
            local_storage()?
                .set_item(key, value)
                .map_err(|e| MirrorError::Io(format!("set_item({}) failed: {:?}", key, e)))
        }

        fn remove(&mut self, key: &str) -> Result<(), MirrorError> {
            local_storage()?
                .remove_item(key)
                .map_err(|e| MirrorError::Io(format!("remove_item({}) failed: {:?}", key, e)))
        }
    }
}
