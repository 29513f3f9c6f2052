//! Logout: drop the server-side session and clear the cookies.

use crate::middleware::ClientCtx;
use crate::session::{get_sess, remove_session};
use actix_web::{get, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use uuid::Uuid;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_logout);
}

#[derive(Template)]
#[template(path = "logout.html")]
struct LogoutTemplate {
    client: ClientCtx,
}

fn session_token(cookies: &actix_session::Session) -> Option<Uuid> {
    let token = cookies
        .get::<String>("token")
        .map_err(|e| log::error!("view_logout: cookies.get() {}", e))
        .ok()??;
    Uuid::parse_str(&token)
        .map_err(|e| log::error!("view_logout: bad token {}", e))
        .ok()
}

#[get("/logout")]
pub async fn view_logout(cookies: actix_session::Session) -> Result<impl Responder, Error> {
    if let Some(uuid) = session_token(&cookies) {
        if let Err(e) = remove_session(get_sess(), uuid).await {
            log::error!("view_logout: remove_session() {}", e);
        }
    }

    // Cookies go regardless; a mangled or absent token still ends in a
    // clean goodbye page.
    cookies.remove("logged_in");
    cookies.remove("token");

    // Rebuild the context after the purge so the page renders as a guest.
    let client = ClientCtx::from_session(&cookies).await;

    Ok(LogoutTemplate { client }.to_response())
}
