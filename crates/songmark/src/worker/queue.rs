use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::error::WorkerError;

use super::job::{Job, Priority};

/// Two-lane bounded job queue. Interactive jobs preempt bulk jobs at
/// dequeue time, so a back-fill sweep never delays a fresh upload.
///
/// Cloning shares both lanes; every clone can submit and receive.
#[derive(Clone)]
pub struct JobQueue {
    interactive_tx: Sender<Job>,
    interactive_rx: Receiver<Job>,
    bulk_tx: Sender<Job>,
    bulk_rx: Receiver<Job>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (interactive_tx, interactive_rx) = bounded(capacity);
        let (bulk_tx, bulk_rx) = bounded(capacity);
        Self {
            interactive_tx,
            interactive_rx,
            bulk_tx,
            bulk_rx,
        }
    }

    /// Non-blocking submit. A full lane is a backpressure signal the
    /// caller surfaces rather than a reason to block an upload thread.
    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        let sender = match job.priority {
            Priority::Interactive => &self.interactive_tx,
            Priority::Bulk => &self.bulk_tx,
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(WorkerError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::ChannelClosed),
        }
    }

    /// Receives the next job, draining the interactive lane first.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Job, RecvTimeoutError> {
        // Interactive work waiting right now wins unconditionally.
        if let Ok(job) = self.interactive_rx.try_recv() {
            return Ok(job);
        }
        if let Ok(job) = self.bulk_rx.try_recv() {
            return Ok(job);
        }

        crossbeam_channel::select! {
            recv(self.interactive_rx) -> job => job.map_err(|_| RecvTimeoutError::Disconnected),
            recv(self.bulk_rx) -> job => job.map_err(|_| RecvTimeoutError::Disconnected),
            default(timeout) => Err(RecvTimeoutError::Timeout),
        }
    }

    pub fn len(&self) -> usize {
        self.interactive_rx.len() + self.bulk_rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_drained_before_bulk() {
        let queue = JobQueue::new(8);
        queue.submit(Job::bulk("b1")).unwrap();
        queue.submit(Job::bulk("b2")).unwrap();
        queue.submit(Job::interactive("i1")).unwrap();

        let first = queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.recording_id, "i1");

        let second = queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(second.recording_id, "b1");
    }

    #[test]
    fn test_full_lane_reports_backpressure() {
        let queue = JobQueue::new(1);
        queue.submit(Job::interactive("i1")).unwrap();
        let err = queue.submit(Job::interactive("i2")).unwrap_err();
        assert!(matches!(err, WorkerError::QueueFull));

        // The bulk lane is independent.
        queue.submit(Job::bulk("b1")).unwrap();
    }

    #[test]
    fn test_recv_times_out_when_empty() {
        let queue = JobQueue::new(4);
        let err = queue.recv_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, RecvTimeoutError::Timeout));
    }

    #[test]
    fn test_clones_share_lanes() {
        let queue = JobQueue::new(4);
        let submitter = queue.clone();
        submitter.submit(Job::interactive("i1")).unwrap();
        assert_eq!(queue.len(), 1);
        let job = queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(job.recording_id, "i1");
        assert!(queue.is_empty());
    }
}
