use crate::admin::{describe_board, BoardDescription};
use crate::server::ServerTx;
use actix_web::error;
use actix_web::web;
use actix_web::Responder;
use actix_web::Result;
use askama_actix::Template;
use system::Participant;

#[derive(Template)]
#[template(path = "admin-index.html")]
pub struct AdminIndexTemplate {
    participants: Vec<Participant>,
    connections: usize,
    history_len: usize,
    history_capacity: usize,
    strokes: usize,
    shapes: usize,
}

impl From<BoardDescription> for AdminIndexTemplate {
    fn from(board: BoardDescription) -> Self {
        Self {
            participants: board.participants,
            connections: board.connections,
            history_len: board.history_len,
            history_capacity: board.history_capacity,
            strokes: board.strokes,
            shapes: board.shapes,
        }
    }
}

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/admin/").route(web::get().to(admin_index)));
}

pub async fn admin_index(srv_tx: web::Data<ServerTx>) -> Result<impl Responder> {
    let board = describe_board(srv_tx.get_ref())
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(AdminIndexTemplate::from(board))
}
