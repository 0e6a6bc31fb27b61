//! Text provider that reads on a worker thread
//!
//! Reads run on a dedicated thread; results come back over a channel and are
//! applied when the manager polls the provider from `update`. Register with
//! [`ResourceManager::register_polled_provider`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::handle::{ResourceType, UntypedHandle};
use crate::location::ResourceLocation;
use crate::manager::{ResourceManager, UpdateReceiver};
use crate::provider::{ProvideRequest, ResourceProvider};
use crate::source::ContentSource;

/// Default id of [`ThreadedTextProvider`]
pub const THREADED_TEXT_PROVIDER_ID: &str = "ThreadedTextProvider";

struct ReadJob {
    handle: UntypedHandle,
    internal_id: String,
}

struct ReadOutcome {
    handle: UntypedHandle,
    data: io::Result<String>,
}

/// Worker-thread text provider
pub struct ThreadedTextProvider {
    id: String,
    jobs: Option<Sender<ReadJob>>,
    outcomes: Receiver<ReadOutcome>,
    /// Requests waiting on the worker
    requests: RefCell<HashMap<UntypedHandle, ProvideRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedTextProvider {
    /// Provider with the default id
    pub fn new(source: Arc<dyn ContentSource>) -> io::Result<Self> {
        Self::with_id(THREADED_TEXT_PROVIDER_ID, source)
    }

    /// Provider with a custom id
    pub fn with_id(id: impl Into<String>, source: Arc<dyn ContentSource>) -> io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ReadJob>();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();

        let worker = thread::Builder::new()
            .name("void-resource-io".into())
            .spawn(move || {
                for job in job_rx.iter() {
                    let data = source.read_string(&job.internal_id);
                    let outcome = ReadOutcome {
                        handle: job.handle,
                        data,
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            id: id.into(),
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            requests: RefCell::new(HashMap::new()),
            worker: Some(worker),
        })
    }

    /// Requests not yet completed
    pub fn in_flight(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ResourceProvider for ThreadedTextProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn can_provide(&self, resource_type: ResourceType, location: &ResourceLocation) -> bool {
        location.provider_id() == self.id && resource_type.accepts::<String>()
    }

    fn provide(&self, rm: &mut ResourceManager, request: ProvideRequest) {
        let location = request.location();
        request.set_download_status(rm, 0, location.expected_size().unwrap_or(0));

        let job = ReadJob {
            handle: request.handle(),
            internal_id: location.internal_id().to_string(),
        };
        let sent = self
            .jobs
            .as_ref()
            .is_some_and(|jobs| jobs.send(job).is_ok());
        if sent {
            self.requests.borrow_mut().insert(request.handle(), request);
        } else if let Err(err) = request.fail(rm, "io worker is not running") {
            log::warn!("{err}");
        }
    }
}

impl UpdateReceiver for ThreadedTextProvider {
    fn update(&self, rm: &mut ResourceManager, _delta_time: f32) {
        for outcome in self.outcomes.try_iter() {
            let Some(request) = self.requests.borrow_mut().remove(&outcome.handle) else {
                continue;
            };
            let completed = match outcome.data {
                Ok(text) => {
                    let len = text.len() as u64;
                    request.set_download_status(rm, len, len);
                    request.complete(rm, text)
                }
                Err(err) => request.fail(rm, err.to_string()),
            };
            if let Err(err) = completed {
                log::debug!("dropping read result for {:?}: {err}", outcome.handle);
            }
        }
    }
}

impl Drop for ThreadedTextProvider {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("io worker panicked");
            }
        }
    }
}
