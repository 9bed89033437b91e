use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use system::{ClientMessage, ConnectionId, DrawingEvent, JoinRequest, ServerMessage};

use crate::admin::{AdminCommand, BoardDescription};
use crate::connection::ConnectionCommand;
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::history::{DrawKind, HistoryBuffer, DEFAULT_HISTORY_LIMIT};
use crate::roster::Roster;

pub type ServerTx = UnboundedSender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Admin(AdminCommand),
}

impl From<ConnectionCommand> for ServerCommand {
    fn from(command: ConnectionCommand) -> Self {
        ServerCommand::Connection(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    pub history_limit: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Sole owner of the board. Commands are handled one at a time and each runs
/// to completion, so no reader ever sees a half-applied change.
struct Server {
    roster: Roster,
    history: HistoryBuffer,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new(options: &ServerOptions) -> Self {
        Self {
            roster: Roster::new(),
            history: HistoryBuffer::new(options.history_limit),
            connections: ConnectionTxStorage::new(),
        }
    }

    fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command),
            ServerCommand::Admin(command) => self.handle_admin_command(command),
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { connection_id, tx } => self.connect(connection_id, tx),
            ConnectionCommand::Disconnect { from } => self.disconnect(&from),
            ConnectionCommand::Message { from, message } => {
                log::debug!("Ingress {} from {}", message.event_name(), from);
                self.handle_client_message(&from, message)
            }
        }
    }

    fn handle_client_message(&mut self, from: &ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::UserJoin(request) => self.join(from, request),
            ClientMessage::Draw(event) => self.append(from, DrawKind::Stroke, event),
            ClientMessage::DrawShape(event) => self.append(from, DrawKind::Shape, event),
            ClientMessage::Erase(descriptor) => {
                self.connections.send_all_except(from, &ServerMessage::Erase(descriptor));
            }
            ClientMessage::ClearBoard => {
                let dropped = self.history.clear();
                log::info!("Board cleared by {} ({} events dropped)", from, dropped);
                self.connections.send_all(&ServerMessage::ClearBoard);
            }
        }
    }

    fn connect(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        log::info!("New client connected: {}", connection_id);
        self.connections.insert(connection_id, tx);
        if !self.history.is_empty() {
            log::debug!("Replaying {} event(s) to {}", self.history.len(), connection_id);
        }
        self.connections.send(
            &connection_id,
            ServerMessage::DrawingHistory(self.history.snapshot()),
        );
        self.connections
            .send(&connection_id, ServerMessage::ActiveUsers(self.roster.snapshot()));
    }

    fn join(&mut self, from: &ConnectionId, request: JoinRequest) {
        if let Some(previous) = self.roster.get(from) {
            log::debug!("{} joins again, replacing {:?}", from, previous.name);
        }
        let participant = self.roster.join(*from, request);
        self.connections.send_all(&ServerMessage::UserJoined(participant));
        self.broadcast_roster();
    }

    fn append(&mut self, from: &ConnectionId, kind: DrawKind, event: DrawingEvent) {
        let evicted = self.history.append(kind, event.clone());
        if evicted > 0 {
            log::debug!("Evicted {} oldest history event(s)", evicted);
        }
        self.connections.send_all_except(from, &kind.into_message(event));
    }

    fn disconnect(&mut self, from: &ConnectionId) {
        self.connections.remove(from);
        if self.roster.leave(from).is_some() {
            self.connections.send_all(&ServerMessage::UserLeft(*from));
            self.broadcast_roster();
            if self.roster.is_empty() {
                log::info!("Last participant left the board");
            }
        }
        log::info!("Client disconnected: {}", from);
    }

    fn broadcast_roster(&self) {
        self.connections
            .send_all(&ServerMessage::ActiveUsers(self.roster.snapshot()));
    }

    fn handle_admin_command(&self, command: AdminCommand) {
        match command {
            AdminCommand::DescribeBoard { tx } => {
                if tx.send(self.describe()).is_err() {
                    log::debug!("Admin request went away before the reply");
                }
            }
        }
    }

    fn describe(&self) -> BoardDescription {
        let mut participants: Vec<_> = self.roster.participants().cloned().collect();
        participants.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        BoardDescription {
            participants,
            connections: self.connections.len(),
            history_len: self.history.len(),
            history_capacity: self.history.capacity(),
            strokes: self.history.count(DrawKind::Stroke),
            shapes: self.history.count(DrawKind::Shape),
        }
    }
}

pub fn spawn_server(options: ServerOptions) -> ServerTx {
    let (srv_tx, mut srv_rx) = unbounded_channel::<ServerCommand>();

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(&options));
        log::info!(
            "Board server started (history limit {})",
            server.history.capacity()
        );

        while let Some(command) = srv_rx.recv().await {
            server.handle_command(command);
        }
        log::info!("Board server terminated");
    });

    srv_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::describe_board;
    use system::serde_json::json;
    use system::uuid::Uuid;
    use system::ActiveUsers;
    use tokio::sync::mpsc::{self, Receiver};

    fn connect(server: &mut Server) -> (ConnectionId, Receiver<ServerMessage>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        server.handle_command(ConnectionCommand::Connect { connection_id, tx }.into());
        (connection_id, rx)
    }

    fn send(server: &mut Server, from: ConnectionId, message: ClientMessage) {
        server.handle_command(ConnectionCommand::Message { from, message }.into());
    }

    fn join(server: &mut Server, from: ConnectionId, name: &str) {
        let request = JoinRequest {
            name: Some(name.into()),
            color: None,
        };
        send(server, from, ClientMessage::UserJoin(request));
    }

    fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn stroke(n: usize) -> DrawingEvent {
        json!({ "x0": n, "y0": n, "x1": n + 1, "y1": n + 1, "color": "#000000" })
    }

    fn names(users: &ActiveUsers) -> Vec<String> {
        let mut names: Vec<_> = users.values().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn it_sends_history_then_roster_on_connect() {
        let mut server = Server::new(&ServerOptions::default());
        let (_, mut rx) = connect(&mut server);
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::DrawingHistory(vec![]),
                ServerMessage::ActiveUsers(ActiveUsers::new()),
            ]
        );
    }

    #[test]
    fn it_replays_appended_events_in_order() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, _a_rx) = connect(&mut server);
        send(&mut server, a, ClientMessage::Draw(stroke(1)));
        send(&mut server, a, ClientMessage::DrawShape(stroke(2)));
        send(&mut server, a, ClientMessage::Draw(stroke(3)));

        let (_, mut late_rx) = connect(&mut server);
        assert_eq!(
            drain(&mut late_rx)[0],
            ServerMessage::DrawingHistory(vec![stroke(1), stroke(2), stroke(3)])
        );
    }

    #[test]
    fn it_replays_only_the_most_recent_events() {
        let mut server = Server::new(&ServerOptions { history_limit: 3 });
        let (a, _a_rx) = connect(&mut server);
        for n in 0..5 {
            send(&mut server, a, ClientMessage::Draw(stroke(n)));
        }

        let (_, mut late_rx) = connect(&mut server);
        assert_eq!(
            drain(&mut late_rx)[0],
            ServerMessage::DrawingHistory(vec![stroke(2), stroke(3), stroke(4)])
        );
    }

    #[test]
    fn it_relays_drawing_to_everyone_but_the_sender() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, mut a_rx) = connect(&mut server);
        let (_, mut b_rx) = connect(&mut server);
        let (_, mut c_rx) = connect(&mut server);
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        send(&mut server, a, ClientMessage::Draw(stroke(1)));
        send(&mut server, a, ClientMessage::DrawShape(stroke(2)));
        send(&mut server, a, ClientMessage::Erase(json!({"x": 4, "y": 4})));

        let expected = vec![
            ServerMessage::Draw(stroke(1)),
            ServerMessage::DrawShape(stroke(2)),
            ServerMessage::Erase(json!({"x": 4, "y": 4})),
        ];
        assert!(drain(&mut a_rx).is_empty());
        assert_eq!(drain(&mut b_rx), expected);
        assert_eq!(drain(&mut c_rx), expected);
    }

    #[test]
    fn it_never_records_erase() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, _a_rx) = connect(&mut server);
        send(&mut server, a, ClientMessage::Draw(stroke(1)));
        send(&mut server, a, ClientMessage::Erase(json!({"x": 1, "y": 1})));

        let (_, mut late_rx) = connect(&mut server);
        assert_eq!(
            drain(&mut late_rx)[0],
            ServerMessage::DrawingHistory(vec![stroke(1)])
        );
    }

    #[test]
    fn it_reflects_clear_to_sender_and_empties_history() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, mut a_rx) = connect(&mut server);
        let (_, mut b_rx) = connect(&mut server);
        send(&mut server, a, ClientMessage::Draw(stroke(1)));
        drain(&mut a_rx);
        drain(&mut b_rx);

        send(&mut server, a, ClientMessage::ClearBoard);
        assert_eq!(drain(&mut a_rx), vec![ServerMessage::ClearBoard]);
        assert_eq!(drain(&mut b_rx), vec![ServerMessage::ClearBoard]);

        let (_, mut late_rx) = connect(&mut server);
        assert_eq!(
            drain(&mut late_rx)[0],
            ServerMessage::DrawingHistory(vec![])
        );
    }

    #[test]
    fn it_announces_join_to_everyone() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, mut a_rx) = connect(&mut server);
        let (_, mut b_rx) = connect(&mut server);
        drain(&mut a_rx);
        drain(&mut b_rx);

        join(&mut server, a, "Alice");
        for rx in [&mut a_rx, &mut b_rx].iter_mut() {
            let messages = drain(rx);
            assert_eq!(messages.len(), 2);
            match &messages[0] {
                ServerMessage::UserJoined(p) => {
                    assert_eq!(p.id, a);
                    assert_eq!(p.name, "Alice");
                }
                other => panic!("unexpected {:?}", other),
            }
            match &messages[1] {
                ServerMessage::ActiveUsers(users) => assert_eq!(names(users), vec!["Alice"]),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn it_stays_silent_when_unjoined_connection_leaves() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, _a_rx) = connect(&mut server);
        let (_, mut b_rx) = connect(&mut server);
        drain(&mut b_rx);

        server.handle_command(ConnectionCommand::Disconnect { from: a }.into());
        server.handle_command(ConnectionCommand::Disconnect { from: a }.into());
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(server.connections.len(), 1);
    }

    #[test]
    fn it_converges_everyone_on_the_same_roster() {
        let mut server = Server::new(&ServerOptions::default());
        let (a, mut a_rx) = connect(&mut server);
        let (b, mut b_rx) = connect(&mut server);
        join(&mut server, a, "Alice");
        join(&mut server, b, "Bob");

        // Alice and Bob join, then Alice draws three strokes.
        for n in 1..=3 {
            send(&mut server, a, ClientMessage::Draw(stroke(n)));
        }
        drain(&mut a_rx);
        let from_alice = drain(&mut b_rx);
        assert_eq!(
            from_alice
                .iter()
                .filter(|m| matches!(m, ServerMessage::Draw(_)))
                .count(),
            3
        );

        // Carol connects and gets the board as it stands.
        let (_, mut c_rx) = connect(&mut server);
        let on_connect = drain(&mut c_rx);
        assert_eq!(
            on_connect[0],
            ServerMessage::DrawingHistory(vec![stroke(1), stroke(2), stroke(3)])
        );
        assert_eq!(on_connect[1], ServerMessage::ActiveUsers(server.roster.snapshot()));
        match &on_connect[1] {
            ServerMessage::ActiveUsers(users) => assert_eq!(names(users), vec!["Alice", "Bob"]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(drain(&mut b_rx).is_empty());

        // Alice leaves.
        server.handle_command(ConnectionCommand::Disconnect { from: a }.into());
        for rx in [&mut b_rx, &mut c_rx].iter_mut() {
            let messages = drain(rx);
            assert_eq!(messages[0], ServerMessage::UserLeft(a));
            assert_eq!(
                messages[1],
                ServerMessage::ActiveUsers(server.roster.snapshot())
            );
            match &messages[1] {
                ServerMessage::ActiveUsers(users) => {
                    assert_eq!(names(users), vec!["Bob"]);
                    assert!(users.contains_key(&b));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn it_serves_commands_through_its_channel() {
        let srv_tx = spawn_server(ServerOptions { history_limit: 2 });
        let a = Uuid::new_v4();
        let (tx, mut a_rx) = mpsc::channel(16);
        srv_tx
            .send(ConnectionCommand::Connect { connection_id: a, tx }.into())
            .expect("");
        for n in 0..3 {
            srv_tx
                .send(
                    ConnectionCommand::Message {
                        from: a,
                        message: ClientMessage::Draw(stroke(n)),
                    }
                    .into(),
                )
                .expect("");
        }
        join_over(&srv_tx, a, "Alice");

        let description = describe_board(&srv_tx).await.expect("");
        assert_eq!(description.connections, 1);
        assert_eq!(description.history_len, 2);
        assert_eq!(description.history_capacity, 2);
        assert_eq!(description.strokes, 2);
        assert_eq!(description.shapes, 0);
        assert_eq!(description.participants.len(), 1);
        assert_eq!(description.participants[0].name, "Alice");

        assert_eq!(
            a_rx.recv().await,
            Some(ServerMessage::DrawingHistory(vec![]))
        );
        assert_eq!(
            a_rx.recv().await,
            Some(ServerMessage::ActiveUsers(ActiveUsers::new()))
        );
        assert!(matches!(
            a_rx.recv().await,
            Some(ServerMessage::UserJoined(_))
        ));
    }

    fn join_over(srv_tx: &ServerTx, from: ConnectionId, name: &str) {
        let message = ClientMessage::UserJoin(JoinRequest {
            name: Some(name.into()),
            color: None,
        });
        srv_tx
            .send(ConnectionCommand::Message { from, message }.into())
            .expect("");
    }
}
