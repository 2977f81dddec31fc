//! Caller-owned streaming result sets
//!
//! A query runs on a producer task that decodes rows and pushes them through
//! a bounded channel. The consumer side is a [`RowCursor`]; dropping it closes
//! the channel, the producer notices at its next send and drops the driver
//! stream, which returns the connection to its pool.

use crate::database::types::Record;
use crate::error::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Rows buffered between producer and consumer
const CURSOR_BUFFER: usize = 64;

enum Source {
    Streaming(mpsc::Receiver<Result<Record>>),
    Buffered(VecDeque<Record>),
}

/// Streaming cursor over decoded rows
pub struct RowCursor {
    source: Source,
    ready: Option<oneshot::Receiver<Result<()>>>,
}

/// Producer half of a [`RowCursor`]
pub struct RowSink {
    tx: mpsc::Sender<Result<Record>>,
    ready: Option<oneshot::Sender<Result<()>>>,
}

impl RowCursor {
    /// Create a connected producer/consumer pair
    pub fn channel() -> (RowSink, RowCursor) {
        let (tx, rx) = mpsc::channel(CURSOR_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();

        (
            RowSink {
                tx,
                ready: Some(ready_tx),
            },
            RowCursor {
                source: Source::Streaming(rx),
                ready: Some(ready_rx),
            },
        )
    }

    /// A cursor over rows that are already in memory
    pub fn from_records(records: Vec<Record>) -> Self {
        RowCursor {
            source: Source::Buffered(records.into()),
            ready: None,
        }
    }

    /// An exhausted cursor
    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    /// Wait until the producer has either yielded its first row, finished,
    /// or failed before producing anything
    pub async fn ready(mut self) -> Result<Self> {
        if let Some(ready) = self.ready.take() {
            match ready.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(Error::internal(
                        "row producer stopped before the result was ready",
                    ))
                }
            }
        }
        Ok(self)
    }

    /// Next decoded row, `None` once the result set is exhausted
    pub async fn next(&mut self) -> Option<Result<Record>> {
        StreamExt::next(self).await
    }

    /// Drain the remaining rows, stopping at the first error
    pub async fn collect_all(mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(row) = self.next().await {
            records.push(row?);
        }
        Ok(records)
    }
}

impl Stream for RowCursor {
    type Item = Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().source {
            Source::Streaming(rx) => rx.poll_recv(cx),
            Source::Buffered(rows) => Poll::Ready(rows.pop_front().map(Ok)),
        }
    }
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            Source::Streaming(_) => "streaming",
            Source::Buffered(_) => "buffered",
        };
        f.debug_struct("RowCursor").field("source", &kind).finish()
    }
}

impl RowSink {
    /// Push rows from `rows` to the cursor until it is exhausted or the
    /// cursor is dropped
    ///
    /// An error before the first row fails the pending `ready()`; a later
    /// error is delivered as the cursor's last item.
    pub async fn forward<S>(mut self, rows: S)
    where
        S: Stream<Item = Result<Record>>,
    {
        let mut rows = Box::pin(rows);

        while let Some(item) = rows.next().await {
            match item {
                Ok(record) => {
                    if self.tx.send(Ok(record)).await.is_err() {
                        log::trace!("row cursor dropped, stopping producer");
                        return;
                    }
                    self.signal_ready(Ok(()));
                }
                Err(e) => {
                    match self.ready.take() {
                        Some(ready) => {
                            let _ = ready.send(Err(e));
                        }
                        None => {
                            let _ = self.tx.send(Err(e)).await;
                        }
                    }
                    return;
                }
            }
        }

        self.signal_ready(Ok(()));
    }

    fn signal_ready(&mut self, result: Result<()>) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::SqlValue;
    use futures::stream;

    fn record(id: i64) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), SqlValue::Integer(id));
        record
    }

    #[tokio::test]
    async fn test_streams_rows_in_order() {
        let (sink, cursor) = RowCursor::channel();
        let rows: Vec<Result<Record>> = (1..=3).map(|i| Ok(record(i))).collect();
        tokio::spawn(sink.forward(stream::iter(rows)));

        let records = cursor.ready().await.unwrap().collect_all().await.unwrap();
        let ids: Vec<i64> = records.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_error_before_first_row_fails_ready() {
        let (sink, cursor) = RowCursor::channel();
        let rows = vec![Err(Error::statement("no such table: missing"))];
        tokio::spawn(sink.forward(stream::iter(rows)));

        let err = cursor.ready().await.unwrap_err();
        assert!(matches!(err, Error::Statement(_)));
    }

    #[tokio::test]
    async fn test_error_after_first_row_is_delivered_on_cursor() {
        let (sink, cursor) = RowCursor::channel();
        let rows = vec![Ok(record(1)), Err(Error::statement("decode failed"))];
        tokio::spawn(sink.forward(stream::iter(rows)));

        let mut cursor = cursor.ready().await.unwrap();
        assert!(cursor.next().await.unwrap().is_ok());
        assert!(cursor.next().await.unwrap().is_err());
        assert!(cursor.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_result_is_ready() {
        let (sink, cursor) = RowCursor::channel();
        tokio::spawn(sink.forward(stream::iter(Vec::<Result<Record>>::new())));

        let records = cursor.ready().await.unwrap().collect_all().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_cursor_stops_producer() {
        let (sink, cursor) = RowCursor::channel();
        let endless = stream::iter((0..).map(|i| Ok(record(i))));
        let producer = tokio::spawn(sink.forward(endless));

        let mut cursor = cursor.ready().await.unwrap();
        assert!(cursor.next().await.is_some());
        drop(cursor);

        tokio::time::timeout(std::time::Duration::from_secs(5), producer)
            .await
            .expect("producer should stop once the cursor is dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_buffered_cursor() {
        let cursor = RowCursor::from_records(vec![record(7)]);
        let records = cursor.ready().await.unwrap().collect_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], SqlValue::Integer(7));
    }
}
