use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use common::err::CResult;
use common::err::decode_error::ReError;

use crate::job::Job;
use crate::worker::Worker;

struct Submission {
    job: Job,
    respond_to: oneshot::Sender<CResult<()>>,
}

/// A bounded pool of `worker_count` Tokio tasks, each owning one `Worker`, consuming
/// jobs off a shared `mpsc` channel (§5 Scheduling model). Every submission carries a
/// `oneshot` completion channel; callers that need serialize-and-wait (DDL jobs) await
/// it immediately, callers draining chunks collect the receivers and await them as a set.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Submission>>,
    handles: Vec<JoinHandle<CResult<()>>>,
}

impl WorkerPool {
    pub fn spawn(workers: Vec<Worker>) -> Self {
        let (sender, receiver) = mpsc::channel::<Submission>(workers.len().max(1) * 4);
        let receiver = std::sync::Arc::new(tokio::sync::Mutex::new(receiver));

        let mut handles = Vec::with_capacity(workers.len());
        for mut worker in workers {
            let receiver = receiver.clone();
            let handle = tokio::spawn(async move {
                loop {
                    let submission = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(Submission { job, respond_to }) = submission else {
                        break;
                    };
                    let result = worker.run(job).await;
                    let _ = respond_to.send(result);
                }
                worker.terminate().await
            });
            handles.push(handle);
        }

        Self { sender: Some(sender), handles }
    }

    /// Submits a job and returns a receiver that resolves once some worker finishes it.
    pub async fn submit(&self, job: Job) -> CResult<oneshot::Receiver<CResult<()>>> {
        let (respond_to, rx) = oneshot::channel();
        let sender = self.sender.as_ref().ok_or_else(|| ReError::String("worker pool already closed".into()))?;
        sender
            .send(Submission { job, respond_to })
            .await
            .map_err(|_| ReError::String("worker pool has no live workers".into()))?;
        Ok(rx)
    }

    /// Submits a job and awaits its completion before returning — used for DDL jobs
    /// that must serialize (table/view creation must finish before dependents start).
    pub async fn submit_and_wait(&self, job: Job) -> CResult<()> {
        let rx = self.submit(job).await?;
        rx.await.map_err(|_| ReError::String("worker dropped without responding".into()))?
    }

    /// Closes the submission channel and joins every worker task, which commits each
    /// worker's source transaction in its termination hook before returning.
    pub async fn close(mut self) -> CResult<()> {
        self.sender.take();
        for handle in self.handles.drain(..) {
            handle.await.map_err(|e| ReError::String(e.to_string()))??;
        }
        Ok(())
    }
}
