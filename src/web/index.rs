use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use actix_web::{get, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

/// Sends each visitor to the screen their role can actually use.
#[get("/")]
pub async fn view_index(client: ClientCtx) -> impl Responder {
    let target = match client.get_id() {
        None => "/login",
        Some(_) if client.is_approved() => "/infractions",
        Some(id) => {
            // The cached role can lag an approval. Re-resolve before
            // parking the user in the waiting room.
            if crate::role::refresh(get_db_pool(), id).await.is_approved() {
                "/infractions"
            } else {
                "/access/pending"
            }
        }
    };

    HttpResponse::SeeOther()
        .append_header(("Location", target))
        .finish()
}
