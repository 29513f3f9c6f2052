use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use corregedoria::config::create_config;
use corregedoria::db::{get_db_pool, init_db};
use corregedoria::middleware::ClientCtx;
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use std::time::Duration;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_external();
    init_statics();
    init_db(std::env::var("DATABASE_URL").expect("DATABASE_URL must be set.")).await;

    // Operational settings live in the database so admins can change
    // them at runtime.
    let config = create_config();
    config
        .load_from_database(get_db_pool())
        .await
        .expect("Failed to load configuration from database");

    // The garrison units must exist before the first infraction form renders.
    corregedoria::garrisons::seed_defaults(get_db_pool())
        .await
        .expect("Failed to seed garrison units.");

    let secret_key = session_secret_key();

    // Background maintenance: session expiry, abandoned request expiry, and
    // the retention sweep over deletion history.
    {
        let config = config.clone();
        actix_web::rt::spawn(async move {
            let period = config.cleanup_interval_secs().max(60) as u64;
            let mut interval = actix_web::rt::time::interval(Duration::from_secs(period));
            loop {
                interval.tick().await;

                match corregedoria::session::expire_sessions(corregedoria::session::get_sess())
                    .await
                {
                    Ok(0) => {}
                    Ok(n) => log::info!("Expired {} stale sessions", n),
                    Err(e) => log::error!("Session expiry sweep failed: {}", e),
                }

                if let Err(e) = corregedoria::cleanup::run_scheduled(get_db_pool(), &config).await {
                    log::error!("Scheduled cleanup failed: {}", e);
                }
            }
        });
    }

    HttpServer::new(move || {
        // wrap() layers execute in reverse registration order. The session
        // store has to sit below ClientCtx so the context can resolve the
        // cookie, and the error pages wrap everything the handlers emit.
        App::new()
            .app_data(Data::new(get_db_pool()))
            .app_data(Data::new(config.clone()))
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("X-XSS-Protection", "0"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
                    .add((
                        "Permissions-Policy",
                        "geolocation=(), microphone=(), camera=()",
                    )),
            )
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::BAD_REQUEST, corregedoria::web::error::render_400)
                    .handler(StatusCode::FORBIDDEN, corregedoria::web::error::render_403)
                    .handler(StatusCode::NOT_FOUND, corregedoria::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        corregedoria::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    // Plain HTTP stays usable for local work.
                    .cookie_secure(false)
                    .session_lifecycle(PersistentSession::default())
                    .build(),
            )
            .wrap(Logger::new("%a %{User-Agent}i"))
            .configure(corregedoria::web::configure)
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}

/// Cookie signing key from SECRET_KEY, or a throwaway random key that
/// invalidates every session on restart.
fn session_secret_key() -> Key {
    match std::env::var("SECRET_KEY") {
        Ok(key) => Key::from(key.as_bytes()),
        Err(err) => {
            let generated: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!(
                "SECRET_KEY unusable ({:?}); falling back to a random key, so \
                 existing session cookies will not survive a restart. Set a key \
                 of at least 64 bytes. A fresh one: {}",
                err,
                generated
            );
            Key::from(generated.as_bytes())
        }
    }
}

/// Third-party initialization with no logic of our own attached.
fn init_external() {
    dotenv::dotenv().expect("DotEnv failed to initialize.");
    env_logger::Builder::from_env(Env::default().default_filter_or("debug")).init();
}

/// Process-global state. Each call stands alone so the modules stay
/// testable without booting the whole binary.
fn init_statics() {
    corregedoria::app_config::init();
    corregedoria::session::init();
}
