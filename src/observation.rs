use crate::error::FingerprintError;
use crate::fingerprint_hash::FingerprintId;
use crate::output::FingerprintReport;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread;
use tracing::{debug, error, info};

/// One (identifier, agent) pairing to hand to a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Extended identifier
    pub nid: FingerprintId,
    /// Normalized identifier
    pub norm_nid: FingerprintId,
    /// Client-declared agent string, unmodified
    pub agent: String,
}

impl Observation {
    /// `None` when the report has no fingerprint or the agent is empty.
    #[must_use]
    pub fn from_report(report: &FingerprintReport) -> Option<Self> {
        if report.agent.is_empty() {
            return None;
        }
        let fields = report.fingerprint.as_ref()?;
        Some(Self { nid: fields.nid, norm_nid: fields.norm_nid, agent: report.agent.clone() })
    }
}

/// Destination for observations.
pub trait ObservationSink: Send {
    fn record(&mut self, observation: &Observation) -> Result<(), FingerprintError>;
}

/// Logs each observation.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn record(&mut self, observation: &Observation) -> Result<(), FingerprintError> {
        info!(
            nid = observation.nid.value(),
            norm_nid = observation.norm_nid.value(),
            agent = %observation.agent,
            "observation"
        );
        Ok(())
    }
}

/// Cloneable handle used by connection threads to submit observations.
#[derive(Debug, Clone)]
pub struct ObservationSender {
    sender: Sender<Observation>,
}

impl ObservationSender {
    /// Queue `observation` for the worker. Returns `false` once the worker is gone.
    pub fn submit(&self, observation: Observation) -> bool {
        self.sender.send(observation).is_ok()
    }
}

/// Runs an [`ObservationSink`] on its own thread so the response path never
/// waits on it.
pub struct ObservationRecorder {
    sender: Option<Sender<Observation>>,
    worker: Option<thread::JoinHandle<usize>>,
}

impl ObservationRecorder {
    /// Spawn the worker thread that drains observations into `sink`.
    ///
    /// # Errors
    /// Returns `FingerprintError::Io` if the thread cannot be spawned.
    pub fn spawn<S>(sink: S) -> Result<Self, FingerprintError>
    where
        S: ObservationSink + 'static,
    {
        let (sender, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name("observation-recorder".to_string())
            .spawn(move || drain(sink, receiver))?;
        Ok(Self { sender: Some(sender), worker: Some(worker) })
    }

    /// New handle for submitting observations.
    ///
    /// After [`shutdown`](Self::shutdown) the handle is disconnected and every
    /// submit returns `false`.
    pub fn sender(&self) -> ObservationSender {
        match &self.sender {
            Some(sender) => ObservationSender { sender: sender.clone() },
            None => {
                let (sender, _) = unbounded();
                ObservationSender { sender }
            }
        }
    }

    /// Stop accepting observations and wait for the queue to drain.
    ///
    /// Returns how many observations the sink recorded successfully. The
    /// worker only exits once every outstanding sender has been dropped.
    pub fn shutdown(&mut self) -> usize {
        self.sender.take();
        match self.worker.take().map(thread::JoinHandle::join) {
            Some(Ok(recorded)) => recorded,
            Some(Err(_)) => {
                error!("Observation recorder thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for ObservationRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drain<S: ObservationSink>(mut sink: S, receiver: Receiver<Observation>) -> usize {
    let mut recorded = 0;
    for observation in receiver {
        match sink.record(&observation) {
            Ok(()) => recorded += 1,
            Err(e) => error!("Failed to record observation {}: {e}", observation.nid),
        }
    }
    debug!("Observation recorder stopped after {recorded} records");
    recorded
}
