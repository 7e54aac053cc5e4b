use crate::{ControlStatistics, ProcedureError};
use relay_network::ConnectionRegistry;

use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// State shared between a control server, its accept loop, its sessions and
/// the procedures bound to it.
///
/// The lock here guards only which registry is installed. The registry does
/// its own synchronisation.
#[derive(Default)]
pub(crate) struct ControlState {
    registry: RwLock<Option<Arc<dyn ConnectionRegistry>>>,
    sessions_accepted: AtomicU64,
    sessions_active: AtomicU64,
}

impl ControlState {
    pub fn set_registry(&self, registry: Arc<dyn ConnectionRegistry>) {
        *self.registry.write() = Some(registry);
    }

    pub fn registry(&self) -> Result<Arc<dyn ConnectionRegistry>, ProcedureError> {
        self.registry.read().clone().ok_or(ProcedureError::NoRegistry)
    }

    /// Record a newly accepted session, returning its sequence number and a
    /// guard which keeps it counted as active until dropped.
    pub fn session_started(self: &Arc<Self>) -> (u64, ActiveSession) {
        let id = self.sessions_accepted.fetch_add(1, Ordering::SeqCst) + 1;
        self.sessions_active.fetch_add(1, Ordering::SeqCst);
        (id, ActiveSession(Arc::clone(self)))
    }

    pub fn statistics(&self) -> ControlStatistics {
        ControlStatistics {
            sessions_accepted: self.sessions_accepted.load(Ordering::SeqCst),
            sessions_active: self.sessions_active.load(Ordering::SeqCst),
        }
    }
}

pub(crate) struct ActiveSession(Arc<ControlState>);

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.sessions_active.fetch_sub(1, Ordering::SeqCst);
    }
}
