//! Port interfaces between the protocol logic and its surroundings

use async_trait::async_trait;
use parking_lot::Mutex;
use rws_bridge_domain::{AuthError, Record, Secret};
use thiserror::Error;
use tokio::sync::mpsc;

/// The receiving side of a sink has gone away
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Record sink is closed")]
pub struct SinkClosed;

/// Destination for records produced by the event stream
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: Record) -> Result<(), SinkClosed>;
}

#[async_trait]
impl RecordSink for mpsc::Sender<Record> {
    async fn emit(&self, record: Record) -> Result<(), SinkClosed> {
        self.send(record).await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl RecordSink for mpsc::UnboundedSender<Record> {
    async fn emit(&self, record: Record) -> Result<(), SinkClosed> {
        self.send(record).map_err(|_| SinkClosed)
    }
}

/// Sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&self, record: Record) -> Result<(), SinkClosed> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Username and password for the controller login
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: Secret,
    pub password: Secret,
}

/// Source of login credentials
///
/// Called once per login; the returned secrets are dropped (and zeroed) as
/// soon as the login exchange completes.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.emit(Record::new("a")).await.unwrap();
        sink.emit(Record::new("b")).await.unwrap();

        assert_eq!(sink.len(), 2);
        let taken = sink.take();
        assert_eq!(taken[1].name, "b");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sinks_report_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<Record>();
        drop(rx);
        assert_eq!(tx.emit(Record::new("a")).await, Err(SinkClosed));

        let (tx, mut rx) = mpsc::channel::<Record>(1);
        tx.emit(Record::new("b")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().name, "b");
    }
}
