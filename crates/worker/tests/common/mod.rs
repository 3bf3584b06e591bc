//! Shared fixtures for worker integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use varia_core::progress::ProgressEvent;
use varia_core::request::{RequestOrigin, VariationForm, VariationRequest};
use varia_core::storage::StorageLayout;
use varia_core::types::SessionId;
use varia_events::ProgressPublisher;
use varia_generator::{GeneratedVariation, GenerationParams, GeneratorError, VariationGenerator};
use varia_worker::{JobExecutor, WorkerContext};

pub const USER_ID: i64 = 7;
pub const SESSION: &str = "sid-test";

/// What the scripted generator does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Produce(&'static [u8]),
    RejectInput,
    Crash,
}

/// Generator that replays a fixed script, one step per call.
pub struct ScriptedGenerator {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<u32>,
}

impl ScriptedGenerator {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl VariationGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        params: &GenerationParams<'_>,
    ) -> Result<GeneratedVariation, GeneratorError> {
        assert_eq!(params.n_var, 1);
        *self.calls.lock().unwrap() += 1;
        let step = self.steps.lock().unwrap().pop_front().expect("generator script exhausted");
        match step {
            Step::Produce(data) => Ok(GeneratedVariation {
                data: data.to_vec(),
            }),
            Step::RejectInput => Err(GeneratorError::InvalidInput {
                reason: "bar range out of bounds".into(),
            }),
            Step::Crash => Err(GeneratorError::Service {
                status: 500,
                body: "model crashed".into(),
            }),
        }
    }
}

/// Publisher that records every event in order.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(SessionId, ProgressEvent)>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(session, _)| session.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressPublisher for RecordingPublisher {
    async fn publish(&self, session_id: &SessionId, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap()
            .push((session_id.clone(), event));
    }
}

pub struct Harness {
    pub generator: Arc<ScriptedGenerator>,
    pub publisher: Arc<RecordingPublisher>,
    pub storage: StorageLayout,
    pub executor: JobExecutor,
}

pub fn harness(root: &Path, steps: impl IntoIterator<Item = Step>) -> Harness {
    harness_with_storage(
        StorageLayout::new(root.join("uploads"), root.join("variations")),
        steps,
    )
}

pub fn harness_with_storage(storage: StorageLayout, steps: impl IntoIterator<Item = Step>) -> Harness {
    let generator = Arc::new(ScriptedGenerator::new(steps));
    let publisher = Arc::new(RecordingPublisher::default());
    let executor = JobExecutor::new(WorkerContext::new(
        generator.clone(),
        publisher.clone(),
        storage.clone(),
    ));
    Harness {
        generator,
        publisher,
        storage,
        executor,
    }
}

pub fn request(jobs: u32) -> VariationRequest {
    VariationRequest::from_form(
        VariationForm {
            attribute_flags: vec!["false".into(), "false".into(), "false".into(), "true".into()],
            bar_boundaries: vec!["1".into(), "4".into()],
            jobs: Some(jobs),
            ..Default::default()
        },
        RequestOrigin {
            input_path: format!("uploads/{USER_ID}/song.mid").into(),
            output_name: "song.mid".into(),
            session_id: SessionId::new(SESSION),
            user_id: USER_ID,
        },
    )
    .unwrap()
}

pub fn job_complete(job: u32) -> ProgressEvent {
    ProgressEvent::JobComplete {
        filename: "song.mid".into(),
        job,
    }
}
