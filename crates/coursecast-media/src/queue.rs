//! In-process transcode job queue.
//!
//! Jobs are submitted after upload completion and run out-of-band on a
//! semaphore-bounded worker pool, so a transcode never holds a
//! request/response path. There is no mid-flight cancellation: shutdown
//! stops claiming new jobs and in-flight jobs run to their own end.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::transcode::{TranscodeJob, TranscodeWorker};

const SUBMIT_CHANNEL_CAPACITY: usize = 64;

pub struct TranscodeQueue {
    submit_tx: mpsc::Sender<TranscodeJob>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TranscodeQueue {
    /// Create a queue and spawn its worker pool.
    pub fn new(worker: Arc<TranscodeWorker>, max_concurrent: usize) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(SUBMIT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(
            worker,
            submit_rx,
            shutdown_rx,
            max_concurrent,
        ));

        Self {
            submit_tx,
            shutdown_tx,
        }
    }

    /// Enqueue a job. Returns once the job is accepted, not once it runs.
    pub async fn submit(&self, job: TranscodeJob) -> Result<()> {
        let video_id = job.video_id;
        self.submit_tx
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("Transcode queue is shut down"))?;

        tracing::info!(video_id = %video_id, "Transcode job enqueued");
        Ok(())
    }

    async fn worker_pool(
        worker: Arc<TranscodeWorker>,
        mut submit_rx: mpsc::Receiver<TranscodeJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        max_concurrent: usize,
    ) {
        tracing::info!(max_concurrent, "Transcode worker pool started");

        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Transcode worker pool shutting down");
                    break;
                }
                job = submit_rx.recv() => {
                    let Some(job) = job else { break };

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let worker = worker.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let report = worker.run(job).await;
                        if let Err(e) = &report.outcome {
                            tracing::error!(
                                video_id = %report.video_id,
                                error = %e,
                                "Transcode job ended in failure"
                            );
                        }
                    });
                }
            }
        }

        tracing::info!("Transcode worker pool stopped");
    }

    /// Signal the pool to stop claiming new jobs. In-flight jobs finish on
    /// their own; their scratch cleanup is unconditional either way.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl Clone for TranscodeQueue {
    fn clone(&self) -> Self {
        Self {
            submit_tx: self.submit_tx.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}
