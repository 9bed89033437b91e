use crate::connection::ws_index;
use crate::handlers::admin::configure_admin_handlers;
use crate::handlers::status::status;
use actix_cors::Cors;
use actix_web::web;

mod admin;
mod status;

pub use status::STATUS_TEXT;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(status)));
    cfg.service(web::resource("/ws/").route(web::get().to(ws_index)));

    configure_admin_handlers(cfg);
}

/// Any origin may connect, with credentials, as long as it only GETs or POSTs.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allow_any_header()
        .supports_credentials()
}
