use crate::domain::ports::{AuthUser, PdvBackend};
use crate::domain::sale::StoreId;
use crate::error::{PdvError, Result};

/// Authenticated context the controller carries between screens.
///
/// Initialized on sign-in, torn down on sign-out. The store id is lazily
/// resolved on first use and cached afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: AuthUser,
    store_id: Option<StoreId>,
}

impl Session {
    pub fn new(user: AuthUser) -> Self {
        Self {
            user,
            store_id: None,
        }
    }

    pub fn store_id(&self) -> Option<&StoreId> {
        self.store_id.as_ref()
    }

    /// Returns the cached store id, looking it up through the backend once
    /// when the cache is empty. Fails with `StoreNotFound` when the user
    /// has no store at all.
    pub async fn ensure_store(&mut self, backend: &dyn PdvBackend) -> Result<StoreId> {
        if let Some(id) = &self.store_id {
            return Ok(id.clone());
        }

        match backend.resolve_store(&self.user.id).await? {
            Some(id) => {
                self.store_id = Some(id.clone());
                Ok(id)
            }
            None => Err(PdvError::StoreNotFound),
        }
    }
}
