use crate::server::{ServerCommand, ServerTx};
use system::Participant;
use thiserror::Error;
use tokio::sync::oneshot::{self, Sender};

#[derive(Debug)]
pub enum AdminCommand {
    DescribeBoard { tx: Sender<BoardDescription> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardDescription {
    /// Sorted by name, then id.
    pub participants: Vec<Participant>,
    pub connections: usize,
    pub history_len: usize,
    pub history_capacity: usize,
    pub strokes: usize,
    pub shapes: usize,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("server task is not running")]
    ServerGone,
    #[error("server task dropped the reply")]
    NoReply,
}

pub async fn describe_board(srv_tx: &ServerTx) -> Result<BoardDescription, AdminError> {
    let (tx, rx) = oneshot::channel();
    srv_tx
        .send(ServerCommand::Admin(AdminCommand::DescribeBoard { tx }))
        .map_err(|_| AdminError::ServerGone)?;
    rx.await.map_err(|_| AdminError::NoReply)
}
