use rand::Rng;
use std::collections::HashMap;
use system::{ActiveUsers, ConnectionId, JoinRequest, Participant};

/// Connected participants keyed by connection. Only the server task mutates it.
#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<ConnectionId, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the participant for `connection_id`. Empty or
    /// missing fields get a generated name and a random colour.
    pub fn join(&mut self, connection_id: ConnectionId, request: JoinRequest) -> Participant {
        let ordinal = self.participants.len() + 1;
        let name = request
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("User {}", ordinal));
        let color = request
            .color
            .filter(|color| !color.is_empty())
            .unwrap_or_else(random_color);

        let participant = Participant {
            id: connection_id,
            name,
            color,
        };
        self.participants
            .insert(connection_id, participant.clone());
        log::info!(
            "Participant {} joined as {:?}",
            connection_id,
            participant.name
        );
        participant
    }

    pub fn leave(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        let removed = self.participants.remove(connection_id);
        if let Some(ref participant) = removed {
            log::info!("Participant {} ({:?}) left", connection_id, participant.name);
        }
        removed
    }

    pub fn snapshot(&self) -> ActiveUsers {
        self.participants.clone()
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// `#rrggbb` with uniformly random channels.
pub fn random_color() -> String {
    format!("#{:06x}", rand::rng().random_range(0..=0x00ff_ffffu32))
}
