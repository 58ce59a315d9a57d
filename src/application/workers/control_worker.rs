use crate::application::events::{EngineCommand, EngineCommandResponse, EngineSnapshot, InboxMessage};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct ControlRequest {
    pub command: EngineCommand,
    pub reply: oneshot::Sender<EngineCommandResponse>,
}

/// Consumes `ControlPort` commands and dispatches them. Snapshots are
/// request/reply'd through the `AnalysisWorker`'s inbox so the answer
/// reflects a consistent view of the buffers it exclusively owns.
///
/// Holds the join handles of the other three workers so `Stop` can wait for
/// them to actually finish, rather than just flipping the cancel signal.
pub struct ControlWorker {
    control_rx: mpsc::Receiver<ControlRequest>,
    inbox_tx: mpsc::Sender<InboxMessage>,
    cancel_tx: watch::Sender<bool>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl ControlWorker {
    pub fn new(
        control_rx: mpsc::Receiver<ControlRequest>,
        inbox_tx: mpsc::Sender<InboxMessage>,
        cancel_tx: watch::Sender<bool>,
        worker_handles: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            control_rx,
            inbox_tx,
            cancel_tx,
            worker_handles,
        }
    }

    pub async fn run(mut self) {
        while let Some(request) = self.control_rx.recv().await {
            let response = self.dispatch(request.command).await;
            let _ = request.reply.send(response);
        }
    }

    async fn dispatch(&mut self, command: EngineCommand) -> EngineCommandResponse {
        match command {
            EngineCommand::Start => {
                info!("ControlWorker: start requested");
                EngineCommandResponse::Started
            }
            EngineCommand::Stop { timeout } => {
                info!("ControlWorker: stop requested");
                let _ = self.cancel_tx.send(true);
                let handles: Vec<_> = self.worker_handles.drain(..).collect();
                match tokio::time::timeout(timeout, join_all(handles)).await {
                    Ok(()) => info!("ControlWorker: all workers joined"),
                    Err(_) => warn!(?timeout, "ControlWorker: stop timeout elapsed, abandoning workers"),
                }
                EngineCommandResponse::Stopped
            }
            EngineCommand::Snapshot => {
                let (reply_tx, reply_rx) = oneshot::channel::<EngineSnapshot>();
                if self.inbox_tx.send(InboxMessage::SnapshotRequest(reply_tx)).await.is_err() {
                    return EngineCommandResponse::Rejected {
                        reason: "analysis worker unavailable".to_string(),
                    };
                }
                match reply_rx.await {
                    Ok(snapshot) => EngineCommandResponse::Snapshot(Box::new(snapshot)),
                    Err(_) => EngineCommandResponse::Rejected {
                        reason: "snapshot request dropped".to_string(),
                    },
                }
            }
            EngineCommand::Accept { signal_id } => {
                let _ = self
                    .inbox_tx
                    .send(InboxMessage::Feedback { signal_id, accepted: true })
                    .await;
                EngineCommandResponse::Accepted
            }
            EngineCommand::Skip { signal_id } => {
                let _ = self
                    .inbox_tx
                    .send(InboxMessage::Feedback { signal_id, accepted: false })
                    .await;
                EngineCommandResponse::Skipped
            }
        }
    }
}

/// Awaits every handle in order; a worker panic is swallowed the same way a
/// cooperative exit is, since `Stop` only cares that the task is no longer
/// running.
async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
