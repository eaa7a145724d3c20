use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logframe_transform::SharedCircularTable;
use logframe_types::StreamsResponse;

/// Running totals for one tail session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TailStats {
    /// Responses applied to the buffer
    pub batches: u64,

    /// Rows appended (including ones later evicted)
    pub rows_appended: u64,

    /// Entries that failed to convert
    pub rows_skipped: u64,
}

#[derive(Default)]
struct Counters {
    batches: AtomicU64,
    rows_appended: AtomicU64,
    rows_skipped: AtomicU64,
}

/// Drives one live tail: a single task consumes responses in arrival order
/// and appends each one to the session's buffer
pub struct TailSession {
    /// Cancellation token for stopping the consumer
    cancel: CancellationToken,

    /// Consumer task handle
    task: Option<tokio::task::JoinHandle<()>>,

    /// Buffer the responses land in
    buffer: SharedCircularTable,

    counters: Arc<Counters>,
}

impl TailSession {
    /// Start consuming `responses` into `buffer`
    pub fn spawn<S>(buffer: SharedCircularTable, responses: S) -> Self
    where
        S: Stream<Item = StreamsResponse> + Send + Unpin + 'static,
    {
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let task = Self::spawn_consumer(
            buffer.clone(),
            responses,
            cancel.clone(),
            Arc::clone(&counters),
        );

        info!("tail session started");
        Self {
            cancel,
            task: Some(task),
            buffer,
            counters,
        }
    }

    /// Start consuming from a channel; the session ends when every sender
    /// is dropped
    pub fn from_channel(buffer: SharedCircularTable, rx: mpsc::Receiver<StreamsResponse>) -> Self {
        let responses = futures::stream::unfold(rx, |mut rx| async move {
            let response = rx.recv().await?;
            Some((response, rx))
        });
        Self::spawn(buffer, Box::pin(responses))
    }

    fn spawn_consumer<S>(
        buffer: SharedCircularTable,
        mut responses: S,
        cancel: CancellationToken,
        counters: Arc<Counters>,
    ) -> tokio::task::JoinHandle<()>
    where
        S: Stream<Item = StreamsResponse> + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,

                    next = responses.next() => {
                        let Some(response) = next else {
                            debug!("tail response stream ended");
                            break;
                        };

                        let entries = response.entry_count();
                        let skipped = buffer.append_response(&response);

                        counters.batches.fetch_add(1, Ordering::Relaxed);
                        counters
                            .rows_appended
                            .fetch_add((entries - skipped.count) as u64, Ordering::Relaxed);
                        counters
                            .rows_skipped
                            .fetch_add(skipped.count as u64, Ordering::Relaxed);

                        if let Some(first) = &skipped.first {
                            warn!(
                                skipped = skipped.count,
                                error = %first,
                                "tail response had malformed entries"
                            );
                        }
                    }
                }
            }
            info!("tail session stopped");
        })
    }

    pub fn buffer(&self) -> &SharedCircularTable {
        &self.buffer
    }

    pub fn stats(&self) -> TailStats {
        TailStats {
            batches: self.counters.batches.load(Ordering::Relaxed),
            rows_appended: self.counters.rows_appended.load(Ordering::Relaxed),
            rows_skipped: self.counters.rows_skipped.load(Ordering::Relaxed),
        }
    }

    /// Check if the consumer is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the consumer to stop after the response it is applying, if any
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the consumer to finish
    pub async fn join(mut self) -> TailStats {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "tail consumer task failed");
            }
        }
        self.stats()
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logframe_transform::CircularTable;
    use logframe_types::{LabelSet, LogStream};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn response(entries: &[(&str, &str)]) -> StreamsResponse {
        let labels: LabelSet = [("job", "api"), ("pod", "api-1")].into_iter().collect();
        let mut stream = LogStream::new(labels);
        for (ts, line) in entries {
            stream = stream.with_entry(*ts, *line);
        }
        StreamsResponse::new(vec![stream])
    }

    fn buffer(capacity: usize) -> SharedCircularTable {
        let pinned: LabelSet = [("job", "api")].into_iter().collect();
        CircularTable::for_tail(capacity, pinned).unwrap().into()
    }

    #[tokio::test]
    async fn test_channel_session_appends_in_order() {
        init_tracing();
        let (tx, rx) = mpsc::channel(8);
        let session = TailSession::from_channel(buffer(3), rx);
        let shared = session.buffer().clone();

        tx.send(response(&[("1000000", "a"), ("2000000", "b")]))
            .await
            .unwrap();
        tx.send(response(&[("3000000", "c"), ("bad", "x"), ("4000000", "d")]))
            .await
            .unwrap();
        drop(tx);

        let stats = session.join().await;
        assert_eq!(
            stats,
            TailStats {
                batches: 2,
                rows_appended: 4,
                rows_skipped: 1,
            }
        );

        let lines: Vec<_> = shared
            .snapshot()
            .rows()
            .map(|r| r.line().unwrap().to_string())
            .collect();
        assert_eq!(lines, vec!["b", "c", "d"]);

        let pod_only: LabelSet = [("pod", "api-1")].into_iter().collect();
        assert_eq!(shared.get(0).unwrap().labels(), Some(&pod_only));
    }

    #[tokio::test]
    async fn test_stream_session() {
        init_tracing();
        let responses = futures::stream::iter(vec![
            response(&[("1", "x")]),
            response(&[("2", "y")]),
        ]);
        let session = TailSession::spawn(buffer(1), responses);
        let shared = session.buffer().clone();

        let stats = session.join().await;
        assert_eq!(stats.batches, 2);
        assert_eq!(shared.len(), 1);
        assert_eq!(shared.get(0).unwrap().line(), Some("y"));
    }

    #[tokio::test]
    async fn test_stop_ends_session() {
        init_tracing();
        let (tx, rx) = mpsc::channel(8);
        let session = TailSession::from_channel(buffer(4), rx);
        let shared = session.buffer().clone();

        session.stop();
        let stats = session.join().await;
        assert_eq!(stats, TailStats::default());

        // the receiver went away with the consumer
        assert!(tx.send(response(&[("1", "late")])).await.is_err());
        assert!(shared.is_empty());
    }
}
