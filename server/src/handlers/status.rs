use actix_web::{HttpResponse, Responder};

pub const STATUS_TEXT: &str = "Whiteboard Server is running. Connect your WebSocket client to /ws/.";

pub async fn status() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(STATUS_TEXT)
}
