use crate::application::events::{EngineCommand, EngineCommandResponse, EngineSnapshot};
use crate::application::workers::control_worker::ControlRequest;
use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// The engine's external command surface. Cloning is cheap: every handle
/// shares the same `ControlWorker` mailbox.
#[derive(Clone)]
pub struct EngineHandle {
    control_tx: mpsc::Sender<ControlRequest>,
}

impl EngineHandle {
    pub fn new(control_tx: mpsc::Sender<ControlRequest>) -> Self {
        Self { control_tx }
    }

    async fn call(&self, command: EngineCommand) -> Result<EngineCommandResponse> {
        let (reply, reply_rx) = oneshot::channel();
        self.control_tx
            .send(ControlRequest { command, reply })
            .await
            .map_err(|_| anyhow!("engine control channel closed"))?;
        reply_rx.await.context("engine dropped the control reply channel")
    }

    pub async fn start(&self) -> Result<()> {
        match self.call(EngineCommand::Start).await? {
            EngineCommandResponse::Started => Ok(()),
            other => Err(anyhow!("unexpected response to Start: {other:?}")),
        }
    }

    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        match self.call(EngineCommand::Stop { timeout }).await? {
            EngineCommandResponse::Stopped => Ok(()),
            other => Err(anyhow!("unexpected response to Stop: {other:?}")),
        }
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        match self.call(EngineCommand::Snapshot).await? {
            EngineCommandResponse::Snapshot(snapshot) => Ok(*snapshot),
            EngineCommandResponse::Rejected { reason } => Err(anyhow!("snapshot rejected: {reason}")),
            other => Err(anyhow!("unexpected response to Snapshot: {other:?}")),
        }
    }

    pub async fn accept(&self, signal_id: Uuid) -> Result<()> {
        match self.call(EngineCommand::Accept { signal_id }).await? {
            EngineCommandResponse::Accepted => Ok(()),
            other => Err(anyhow!("unexpected response to Accept: {other:?}")),
        }
    }

    pub async fn skip(&self, signal_id: Uuid) -> Result<()> {
        match self.call(EngineCommand::Skip { signal_id }).await? {
            EngineCommandResponse::Skipped => Ok(()),
            other => Err(anyhow!("unexpected response to Skip: {other:?}")),
        }
    }
}
