use super::{EventKind, EventSubscriber, ItemEvent};
use crate::error::{ManagerError, Result};
use crate::state::InputRole;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

/// Consumer of one input role, shared by every item an owner registers
pub type InputCallback = Arc<dyn Fn(InputRole, &ItemEvent) -> Result<()> + Send + Sync>;

/// Box a closure as an [`InputCallback`]
pub fn input_callback<F>(f: F) -> InputCallback
where
    F: Fn(InputRole, &ItemEvent) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registration {
    owner: String,
    role: InputRole,
    callback: InputCallback,
}

/// Process-wide fan-out of item events to registered managers.
///
/// Every callback runs as its own task on the runtime the dispatcher was
/// created on. A callback that fails or panics is logged and has no effect
/// on the others or on the caller of [`ItemEventDispatcher::dispatch`].
pub struct ItemEventDispatcher {
    runtime: Handle,
    registry: RwLock<HashMap<String, Vec<Registration>>>,
    shutdown: AtomicBool,
}

impl ItemEventDispatcher {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            registry: RwLock::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Dispatcher bound to the runtime of the calling context
    pub fn from_current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| ManagerError::runtime(format!("No tokio runtime available: {}", e)))?;
        Ok(Self::new(handle))
    }

    /// Runtime the callbacks are spawned on
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Register `owner` for every item in `items`, replacing what it had
    pub fn register_events_for(
        &self,
        owner: &str,
        items: HashMap<String, InputRole>,
        callback: InputCallback,
    ) {
        let mut registry = self.registry.write();
        remove_owner(&mut registry, owner);
        for (item, role) in items {
            debug!("Registering {} for item {} as {}", owner, item, role);
            registry.entry(item).or_default().push(Registration {
                owner: owner.to_string(),
                role,
                callback: Arc::clone(&callback),
            });
        }
    }

    pub fn unregister_events_for(&self, owner: &str) {
        let mut registry = self.registry.write();
        remove_owner(&mut registry, owner);
    }

    /// Number of registrations for `item`
    pub fn registration_count(&self, item: &str) -> usize {
        self.registry.read().get(item).map_or(0, Vec::len)
    }

    /// Items `owner` is registered for
    pub fn items_of(&self, owner: &str) -> Vec<String> {
        let mut items: Vec<String> = self
            .registry
            .read()
            .iter()
            .filter(|(_, regs)| regs.iter().any(|r| r.owner == owner))
            .map(|(item, _)| item.clone())
            .collect();
        items.sort();
        items
    }

    /// Hand `event` to every registration of its item.
    ///
    /// Returns the number of callbacks submitted.
    pub fn dispatch(&self, event: &ItemEvent) -> usize {
        let targets: Vec<(InputRole, InputCallback)> = match self.registry.read().get(&event.item)
        {
            Some(regs) => regs
                .iter()
                .map(|r| (r.role, Arc::clone(&r.callback)))
                .collect(),
            None => return 0,
        };

        if self.shutdown.load(Ordering::Acquire) {
            error!(
                "Dispatcher is shut down, dropping {} event for {}",
                event.kind, event.item
            );
            return 0;
        }

        let event = Arc::new(event.clone());
        for (role, callback) in &targets {
            let role = *role;
            let callback = Arc::clone(callback);
            let event = Arc::clone(&event);
            self.runtime.spawn(async move {
                let item = event.item.clone();
                let task = tokio::spawn(async move { callback(role, &*event) });
                match task.await {
                    Ok(Ok(())) => trace!("Delivered {} to {}", item, role),
                    Ok(Err(e)) => error!("Callback for {} ({}) failed: {}", item, role, e),
                    Err(e) => error!("Callback for {} ({}) panicked: {}", item, role, e),
                }
            });
        }
        targets.len()
    }

    /// Reject all further dispatches
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl EventSubscriber for ItemEventDispatcher {
    fn subscribed_kinds(&self) -> &[EventKind] {
        &EventKind::STATE_KINDS
    }

    fn receive(&self, event: &ItemEvent) {
        self.dispatch(event);
    }
}

fn remove_owner(registry: &mut HashMap<String, Vec<Registration>>, owner: &str) {
    registry.retain(|_, regs| {
        regs.retain(|r| r.owner != owner);
        !regs.is_empty()
    });
}
