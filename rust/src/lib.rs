mod actions;
mod core;
mod logging;
mod state;
mod transport;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use state::*;
pub use transport::{ClientEvent, MediaUploadPayload, MessagePayload, ServerEvent, Transport};
pub use updates::AppUpdate;

use transport::SharedTransport;
use updates::{CoreMsg, InternalEvent};

/// Embedder-side callback for the update stream.
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

/// Public handle to the engine. All mutation goes through [`App::dispatch`];
/// reads come from [`App::state`] snapshots or the update stream.
pub struct App {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

impl App {
    pub fn new(data_dir: impl Into<String>) -> Arc<Self> {
        Self::build(data_dir.into(), None)
    }

    fn build(data_dir: String, transport: Option<Arc<dyn Transport>>) -> Arc<Self> {
        logging::init_logging();
        tracing::info!(data_dir = %data_dir, "App::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let transport_slot: SharedTransport = Arc::new(RwLock::new(transport));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        let transport_for_core = transport_slot.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                transport_for_core,
            );
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        })
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(guard) => guard.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block the caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}

impl App {
    /// Construct with a transport already installed, so no websocket is ever
    /// dialed and room traffic can be observed by tests.
    pub fn new_with_transport_for_tests(
        data_dir: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Self::build(data_dir.into(), Some(transport))
    }

    /// Feed a decoded push event straight into the core, as if the transport
    /// had received it.
    pub fn inject_server_event_for_tests(&self, event: ServerEvent) {
        let _ = self.core_tx.send(CoreMsg::Internal(Box::new(
            InternalEvent::ServerEvent(event),
        )));
    }
}
