use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, AsyncContext, Handler, Message, Recipient, Running, StreamHandler,
};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc;

use system::uuid::Uuid;
use system::{ClientMessage, ConnectionId, ServerMessage};

use crate::connection_tx_storage::ConnectionTx;
use crate::server::ServerTx;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        connection_id: ConnectionId,
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    Message {
        from: ConnectionId,
        message: ClientMessage,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    /// Outbound messages queued per connection before new ones are dropped.
    pub outbound_buffer: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(25),
            client_timeout: Duration::from_secs(60),
            outbound_buffer: 1024,
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct Egress(ServerMessage);

struct ConnectionActor {
    connection_id: ConnectionId,
    srv_tx: ServerTx,
    options: ConnectionOptions,
    last_seen: Instant,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, options: ConnectionOptions) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            srv_tx,
            options,
            last_seen: Instant::now(),
        }
    }

    fn send_to_server(&self, command: ConnectionCommand) {
        if self.srv_tx.send(command.into()).is_err() {
            log::error!("Server is gone, dropping command from {}", self.connection_id);
        }
    }

    fn ingress(&self, text: &str) {
        match ClientMessage::from_json(text) {
            Ok(message) => self.send_to_server(ConnectionCommand::Message {
                from: self.connection_id,
                message,
            }),
            Err(err) => log::warn!("Ignoring frame from {}: {}", self.connection_id, err),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.options.client_timeout;
        ctx.run_interval(self.options.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.last_seen) > timeout {
                log::warn!("Connection {} timed out", act.connection_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = mpsc::channel::<ServerMessage>(self.options.outbound_buffer);

        // Must reach the server before any ingress from this connection.
        self.send_to_server(ConnectionCommand::Connect {
            connection_id: self.connection_id,
            tx,
        });

        tokio::spawn(relay(self.connection_id, rx, ctx.address().recipient()));

        self.heartbeat(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.send_to_server(ConnectionCommand::Disconnect {
            from: self.connection_id,
        });
        Running::Stop
    }
}

/// Moves outbound messages into the actor one at a time. Each hand-off waits
/// until the actor has taken the message, and the actor only runs while the
/// socket is being written, so a stalled client leaves `rx` to fill up.
async fn relay(
    connection_id: ConnectionId,
    mut rx: mpsc::Receiver<ServerMessage>,
    addr: Recipient<Egress>,
) {
    log::debug!("connection {} relay - started", connection_id);
    while let Some(message) = rx.recv().await {
        if addr.send(Egress(message)).await.is_err() {
            break;
        }
    }
    log::debug!("connection {} relay - terminated", connection_id);
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!("Connection error on {}: {}", self.connection_id, err);
                ctx.stop();
                return;
            }
        };
        self.last_seen = Instant::now();

        match msg {
            ws::Message::Ping(bytes) => ctx.pong(&bytes),
            ws::Message::Pong(_) => (),
            ws::Message::Text(text) => {
                log::debug!("Ingress size: {}", text.len());
                self.ingress(&text);
            }
            ws::Message::Binary(bin) => match std::str::from_utf8(&bin) {
                Ok(text) => self.ingress(text),
                Err(_) => log::warn!("Ignoring non UTF-8 frame from {}", self.connection_id),
            },
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) => {
                log::warn!("Ignoring fragmented frame from {}", self.connection_id)
            }
            ws::Message::Nop => (),
        }
    }
}

/// Egress
impl Handler<Egress> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: Egress, ctx: &mut ws::WebsocketContext<Self>) -> Self::Result {
        let Egress(message) = msg;
        log::debug!("Egress {} to {}", message.event_name(), self.connection_id);
        match message.to_json() {
            Ok(text) => ctx.text(text),
            Err(err) => log::error!("Could not encode {}: {}", message.event_name(), err),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    options: web::Data<ConnectionOptions>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor::new(srv_tx.get_ref().clone(), *options.get_ref()),
        &req,
        stream,
    )
}
