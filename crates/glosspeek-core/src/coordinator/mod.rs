//! Background coordinator
//!
//! The process-wide singleton behind every surface: it owns the enabled
//! flag and the current settings snapshot, mediates all outbound API
//! calls, and relays state changes to every registered view context.
//! Delivery is best-effort per recipient; a context that went away never
//! affects the others.

pub mod messages;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::provider::discovery::DiscoveryClient;
use crate::provider::translate::TranslationClient;
use crate::settings::{PinnedTranslation, Settings, SettingsPatch, SettingsStore};
use messages::{ContextId, CoordinatorInput, CoordinatorOutput, RequestSeq};

/// Registry of view-context output senders, keyed by context id.
type ContextRegistry = Arc<RwLock<HashMap<ContextId, mpsc::UnboundedSender<CoordinatorOutput>>>>;

/// Handle used by view contexts to register themselves and push inputs.
#[derive(Clone)]
pub struct CoordinatorHandle {
    input_tx: mpsc::Sender<(ContextId, CoordinatorInput)>,
    contexts: ContextRegistry,
}

impl CoordinatorHandle {
    /// Register a view context and get its output channel. Registering an
    /// id again replaces the previous channel.
    pub fn register_context(
        &self,
        id: impl Into<ContextId>,
    ) -> mpsc::UnboundedReceiver<CoordinatorOutput> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.contexts.write().insert(id.into(), tx);
        rx
    }

    /// Drop a context from the broadcast registry.
    pub fn unregister_context(&self, id: &str) {
        self.contexts.write().remove(id);
    }

    /// Send an input to the coordinator on behalf of a context.
    pub async fn send(&self, context_id: &str, input: CoordinatorInput) -> Result<()> {
        self.input_tx
            .send((context_id.to_string(), input))
            .await
            .map_err(|e| Error::CoordinatorGone(e.to_string()))
    }
}

/// The coordinator task. Create it with [`Coordinator::new`] and drive it
/// with [`Coordinator::run`] on a spawned task.
pub struct Coordinator {
    enabled: bool,
    settings: Settings,
    store: Arc<SettingsStore>,
    contexts: ContextRegistry,
    input_rx: mpsc::Receiver<(ContextId, CoordinatorInput)>,
    translator: TranslationClient,
    discovery: DiscoveryClient,
}

impl Coordinator {
    /// Build a coordinator from the persisted store state.
    pub fn new(store: Arc<SettingsStore>) -> Result<(Self, CoordinatorHandle)> {
        let stored = store.get();
        let (input_tx, input_rx) = mpsc::channel(256);
        let contexts: ContextRegistry = Arc::new(RwLock::new(HashMap::new()));

        let coordinator = Self {
            enabled: stored.enabled,
            settings: stored.settings(),
            store,
            contexts: contexts.clone(),
            input_rx,
            translator: TranslationClient::new()?,
            discovery: DiscoveryClient::new()?,
        };
        let handle = CoordinatorHandle {
            input_tx,
            contexts,
        };
        Ok((coordinator, handle))
    }

    /// Process inputs until every handle is dropped.
    pub async fn run(mut self) {
        info!(
            enabled = self.enabled,
            model = %self.settings.model,
            "coordinator started"
        );
        while let Some((context_id, input)) = self.input_rx.recv().await {
            self.handle(context_id, input);
        }
        debug!("coordinator input channel closed");
    }

    fn handle(&mut self, context_id: ContextId, input: CoordinatorInput) {
        match input {
            CoordinatorInput::ToggleEnabled { enabled } => self.set_enabled(enabled),
            CoordinatorInput::UpdateSettings { patch } => self.update_settings(patch),
            CoordinatorInput::Translate { seq, text } => self.translate(context_id, seq, text),
            CoordinatorInput::Pin { pin } => self.pin(context_id, pin),
            CoordinatorInput::FetchModels { base_url, api_key } => {
                self.fetch_models(context_id, base_url, api_key)
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        info!(enabled, "toggling");
        self.enabled = enabled;
        if let Err(e) = self.store.update(|s| s.enabled = enabled) {
            warn!("failed to persist enabled flag: {e}");
        }
        self.broadcast_state();
    }

    fn update_settings(&mut self, patch: SettingsPatch) {
        patch.apply(&mut self.settings);
        if let Err(e) = self.store.update(|s| patch.apply_stored(s)) {
            warn!("failed to persist settings: {e}");
        }
        debug!(model = %self.settings.model, language = %self.settings.target_language, "settings updated");
        self.broadcast_state();
    }

    fn translate(&self, context_id: ContextId, seq: RequestSeq, text: String) {
        // Reject without a network call; the disabled reason wins over the
        // missing key.
        if !self.enabled {
            self.send_to(
                &context_id,
                CoordinatorOutput::translation_failed(seq, "Glosspeek is disabled"),
            );
            return;
        }
        if self.settings.api_key.is_empty() {
            self.send_to(
                &context_id,
                CoordinatorOutput::translation_failed(seq, "API key is missing"),
            );
            return;
        }

        // One attempt with the settings as they are right now; the snapshot
        // is not refreshed if settings change mid-flight.
        let client = self.translator.clone();
        let settings = self.settings.clone();
        let contexts = self.contexts.clone();
        tokio::spawn(async move {
            let output = match client
                .translate(
                    &text,
                    &settings.target_language,
                    &settings.api_key,
                    &settings.base_url,
                    &settings.model,
                )
                .await
            {
                Ok(result) => CoordinatorOutput::translation(seq, result),
                Err(e) => {
                    warn!("translation failed: {e}");
                    CoordinatorOutput::translation_failed(seq, e.to_string())
                }
            };
            deliver(&contexts, &context_id, output);
        });
    }

    fn pin(&self, context_id: ContextId, pin: PinnedTranslation) {
        let success = match self.store.update(|s| s.push_pin(pin)) {
            Ok(_) => true,
            Err(e) => {
                warn!("failed to save pin: {e}");
                false
            }
        };
        self.send_to(&context_id, CoordinatorOutput::pin_saved(success));
    }

    fn fetch_models(&self, context_id: ContextId, base_url: String, api_key: String) {
        let client = self.discovery.clone();
        let contexts = self.contexts.clone();
        tokio::spawn(async move {
            let output = match client.fetch_models(&base_url, &api_key).await {
                Ok(models) => {
                    debug!(count = models.len(), "models discovered");
                    CoordinatorOutput::models(models)
                }
                Err(e) => {
                    warn!("model discovery failed: {e}");
                    CoordinatorOutput::models_failed(e.to_string())
                }
            };
            deliver(&contexts, &context_id, output);
        });
    }

    /// Broadcast the current state to every registered context. Each
    /// delivery fails independently.
    fn broadcast_state(&self) {
        let output = CoordinatorOutput::update_state(self.enabled, self.settings.clone());
        let contexts = self.contexts.read();
        for (id, tx) in contexts.iter() {
            if tx.send(output.clone()).is_err() {
                debug!(context = %id, "state broadcast skipped for closed context");
            }
        }
    }

    fn send_to(&self, context_id: &str, output: CoordinatorOutput) {
        deliver(&self.contexts, context_id, output);
    }
}

fn deliver(contexts: &ContextRegistry, context_id: &str, output: CoordinatorOutput) {
    let contexts = contexts.read();
    match contexts.get(context_id) {
        Some(tx) => {
            if tx.send(output).is_err() {
                debug!(context = %context_id, "reply dropped, context channel closed");
            }
        }
        None => debug!(context = %context_id, "reply dropped, context not registered"),
    }
}
