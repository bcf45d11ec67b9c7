//! Background classification of keyframe payloads.
//!
//! Submitting returns immediately; results arrive on [`JobsHandle::rx_events`]
//! and are applied by whoever polls it.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use renderer::RenderError;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, thread, time::Duration};
use thiserror::Error;
use timeline::{Bitmap, KeyframeId, KeyframeState, LayerId};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("worker pool stopped")]
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub layer: LayerId,
    pub keyframe: KeyframeId,
    pub bitmap: Bitmap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Done(KeyframeState),
    Failed(String),
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool { matches!(self, JobStatus::Done(_) | JobStatus::Failed(_) | JobStatus::Canceled) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub id: String,
    pub layer: LayerId,
    pub keyframe: KeyframeId,
    pub bitmap: Bitmap,
    pub status: JobStatus,
}

impl JobEvent {
    fn new(id: &str, spec: &JobSpec, status: JobStatus) -> Self {
        Self { id: id.to_string(), layer: spec.layer, keyframe: spec.keyframe, bitmap: spec.bitmap.clone(), status }
    }
}

type Queue = Arc<Mutex<VecDeque<(String, JobSpec)>>>;

#[derive(Clone)]
pub struct JobsHandle {
    tx_submit: Sender<(String, JobSpec)>,
    tx_cancel: Sender<String>,
    pub rx_events: Receiver<JobEvent>,
}

pub struct JobsRuntime;

impl JobsRuntime {
    /// Starts `num_workers` workers plus a feeder thread. Everything shuts down once every handle is dropped.
    pub fn start(num_workers: usize) -> JobsHandle {
        let (tx_submit, rx_submit) = unbounded::<(String, JobSpec)>();
        let (tx_cancel, rx_cancel) = unbounded::<String>();
        let (tx_events, rx_events) = unbounded::<JobEvent>();
        let queue: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let canceled = Arc::new(Mutex::new(HashSet::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        for _ in 0..num_workers.max(1) {
            spawn_worker(queue.clone(), canceled.clone(), shutdown.clone(), tx_events.clone());
        }

        // Feeder thread
        {
            let q = queue.clone();
            let canceled = canceled.clone();
            let tx_e = tx_events;
            thread::spawn(move || {
                loop {
                    crossbeam_channel::select! {
                        recv(rx_submit) -> msg => {
                            if let Ok((id, spec)) = msg {
                                if canceled.lock().contains(&id) { continue; }
                                let _ = tx_e.send(JobEvent::new(&id, &spec, JobStatus::Pending));
                                q.lock().push_back((id, spec));
                            }
                            else { break; }
                        }
                        recv(rx_cancel) -> msg => {
                            if let Ok(id) = msg { canceled.lock().insert(id); }
                            else { break; }
                        }
                    }
                }
                shutdown.store(true, Ordering::Release);
                tracing::debug!("jobs feeder stopped");
            });
        }

        JobsHandle { tx_submit, tx_cancel, rx_events }
    }
}

fn spawn_worker(q: Queue, canceled: Arc<Mutex<HashSet<String>>>, shutdown: Arc<AtomicBool>, tx_e: Sender<JobEvent>) {
    thread::spawn(move || loop {
        let job_opt = q.lock().pop_front();
        let Some((id, spec)) = job_opt else {
            if shutdown.load(Ordering::Acquire) { break; }
            thread::sleep(Duration::from_millis(2));
            continue;
        };
        if canceled.lock().remove(&id) {
            let _ = tx_e.send(JobEvent::new(&id, &spec, JobStatus::Canceled));
            continue;
        }
        let _ = tx_e.send(JobEvent::new(&id, &spec, JobStatus::Running));
        let status = match renderer::decode_bitmap(&spec.bitmap) {
            Ok(image) if !renderer::codec::is_transparent(&image) => JobStatus::Done(KeyframeState::Filled),
            Ok(_) | Err(RenderError::Blank) => JobStatus::Done(KeyframeState::Empty),
            Err(err) => JobStatus::Failed(err.to_string()),
        };
        let _ = tx_e.send(JobEvent::new(&id, &spec, status));
    });
}

impl JobsHandle {
    pub fn enqueue(&self, spec: JobSpec) -> Result<String, JobError> {
        let id = Uuid::new_v4().to_string();
        self.tx_submit.send((id.clone(), spec)).map_err(|_| JobError::Stopped)?;
        Ok(id)
    }

    pub fn cancel_job(&self, job_id: &str) {
        let _ = self.tx_cancel.send(job_id.to_string());
    }
}
