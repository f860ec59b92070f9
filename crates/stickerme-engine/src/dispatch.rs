use std::time::Instant;

use serde_json::{json, Map, Value};
use stickerme_contracts::events::{AuditEvent, EventPayload, EventWriter};
use stickerme_contracts::{GenerationRequest, ParameterResolver};
use tracing::{info, info_span, warn};

use crate::compose::{PresentationPayload, ResponseComposer};
use crate::config::EngineConfig;
use crate::error::{DispatchError, StorageError};
use crate::generator::ImageGenerator;
use crate::store::ArtifactStore;

/// Runs one request through resolve, generate, persist and compose.
///
/// Holds no per-request state, so one instance can serve concurrent callers.
pub struct Dispatcher {
    resolver: ParameterResolver,
    generator: Box<dyn ImageGenerator>,
    store: ArtifactStore,
    composer: ResponseComposer,
    events: Option<EventWriter>,
}

impl Dispatcher {
    pub fn new(
        resolver: ParameterResolver,
        generator: Box<dyn ImageGenerator>,
        store: ArtifactStore,
    ) -> Self {
        let composer = ResponseComposer::new(generator.display_name());
        Self {
            resolver,
            generator,
            store,
            composer,
            events: None,
        }
    }

    pub fn from_config(config: &EngineConfig, generator: Box<dyn ImageGenerator>) -> Self {
        Self::new(
            ParameterResolver::new(config.defaults.clone()),
            generator,
            ArtifactStore::new(&config.images_dir, config.write_timeout),
        )
        .with_events(EventWriter::new(config.audit_log_path()))
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn handle(&self, request: &GenerationRequest) -> Result<PresentationPayload, DispatchError> {
        let span = info_span!("dispatch", requester = %request.requester_id);
        let _entered = span.enter();

        let result = self.run(request);
        if let Err(err) = &result {
            warn!(stage = err.stage(), kind = err.kind(), error = %err, "generation request failed");
            self.audit(
                AuditEvent::GenerationFailed,
                &request.requester_id,
                map_object(json!({
                    "stage": err.stage(),
                    "kind": err.kind(),
                    "error": err.to_string(),
                })),
            );
        }
        result
    }

    /// Re-reads the bytes behind a previously returned retrieval action.
    pub fn retrieve(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        self.store.fetch(filename)
    }

    fn run(&self, request: &GenerationRequest) -> Result<PresentationPayload, DispatchError> {
        let resolved = self.resolver.resolve(request)?;
        self.audit(
            AuditEvent::GenerationRequested,
            &request.requester_id,
            map_object(json!({
                "generator": self.generator.name(),
                "resolved": serde_json::to_value(&resolved).unwrap_or(Value::Null),
            })),
        );

        let started = Instant::now();
        let image = self.generator.submit(&resolved)?;
        let latency_s = started.elapsed().as_secs_f64();

        let artifact = self
            .store
            .persist(image, &request.requester_id, &resolved.prompt)?;
        info!(
            filename = %artifact.filename,
            byte_len = artifact.byte_len,
            latency_s,
            "image generated"
        );
        self.audit(
            AuditEvent::ArtifactCreated,
            &request.requester_id,
            map_object(json!({
                "filename": artifact.filename,
                "path": artifact.path.to_string_lossy(),
                "byte_len": artifact.byte_len,
                "sha256": artifact.sha256,
                "latency_s": latency_s,
            })),
        );

        Ok(self.composer.compose(&resolved, &artifact))
    }

    fn audit(&self, event: AuditEvent, requester_id: &str, payload: EventPayload) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.emit(event, requester_id, payload) {
            warn!(event = event.as_str(), error = %err, "failed to append audit event");
        }
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
