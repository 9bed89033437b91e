use std::collections::HashMap;
use system::{ConnectionId, ServerMessage};
use tokio::sync::mpsc::error::TrySendError;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ServerMessage>;

/// Outbound handles of every live connection.
///
/// Sends never wait: a recipient whose buffer is full misses that message,
/// and nobody else is held up by it.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }

    pub fn send(&self, to: &ConnectionId, message: ServerMessage) -> bool {
        if let Some(tx) = self.connection_txs.get(to) {
            deliver(to, tx, message)
        } else {
            log::warn!("No connection {} to send {} to", to, message.event_name());
            false
        }
    }

    /// Returns the number of recipients the message was queued for.
    pub fn send_all(&self, message: &ServerMessage) -> usize {
        self.fan_out(None, message)
    }

    pub fn send_all_except(&self, without: &ConnectionId, message: &ServerMessage) -> usize {
        self.fan_out(Some(without), message)
    }

    fn fan_out(&self, without: Option<&ConnectionId>, message: &ServerMessage) -> usize {
        let sent = self
            .connection_txs
            .iter()
            .filter(|(connection_id, _)| Some(*connection_id) != without)
            .filter(|(connection_id, tx)| deliver(connection_id, tx, message.clone()))
            .count();
        log::debug!("Broadcast {} to {} connection(s)", message.event_name(), sent);
        sent
    }
}

fn deliver(to: &ConnectionId, tx: &ConnectionTx, message: ServerMessage) -> bool {
    match tx.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(message)) => {
            log::warn!(
                "Connection {} is not keeping up, dropped {}",
                to,
                message.event_name()
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            log::debug!("Connection {} already closed", to);
            false
        }
    }
}
