//! Record sink writing one JSON record per line to stdout.

use async_trait::async_trait;
use sqlpub_core::{ConnectorError, Record, RecordSink, Result};
use tokio::io::{AsyncWriteExt, Stdout};

pub(crate) struct StdoutSink {
    out: Stdout,
    written: u64,
}

impl StdoutSink {
    pub(crate) fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
            written: 0,
        }
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .await
            .map_err(|e| ConnectorError::sink(format!("failed to flush stdout: {}", e)))
    }
}

#[async_trait]
impl RecordSink for StdoutSink {
    async fn send(&mut self, record: Record) -> Result<()> {
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| ConnectorError::serialization("failed to encode record", e))?;
        line.push(b'\n');

        self.out
            .write_all(&line)
            .await
            .map_err(|e| ConnectorError::sink(format!("failed to write record: {}", e)))?;
        self.written += 1;
        Ok(())
    }
}
