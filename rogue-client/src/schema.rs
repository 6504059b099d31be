/// Schema synchronization
///
/// A schema set is authoritative: applying one replaces everything the
/// server knows, and data of any type missing from the new set is deleted.
/// Callers must include every type they want to keep.
///
/// Texts are sent verbatim and in order. Syntax checking belongs to the
/// server; on failure nothing is applied and the previous set stays active.
use crate::error::SchemaError;
use crate::request::SchemaSet;
use crate::transport::Transport;
use parking_lot::Mutex;
use rogue_core::{Clock, Credential, SystemClock};
use std::sync::Arc;
use tracing::{info, warn};

pub struct SchemaSync {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<SchemaSet>>,
}

impl SchemaSync {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            active: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the server's schema set
    pub async fn apply(&self, schemas: SchemaSet, credential: &Credential) -> Result<(), SchemaError> {
        if credential.is_expired(self.clock.now()) {
            return Err(SchemaError::CredentialExpired {
                expired_at: credential.expires_at(),
            });
        }

        match self.transport.subscribe(&schemas, credential.token()).await {
            Ok(()) => {
                info!(
                    transport = self.transport.name(),
                    schemas = schemas.len(),
                    "Schema set applied"
                );
                *self.active.lock() = Some(schemas);
                Ok(())
            }
            Err(err) => {
                warn!(transport = self.transport.name(), error = %err, "Schema set rejected; previous set still active");
                Err(err)
            }
        }
    }

    /// The last set this client applied successfully
    pub fn active(&self) -> Option<SchemaSet> {
        self.active.lock().clone()
    }
}
