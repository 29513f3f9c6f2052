//! Per-request client context.
//!
//! The middleware resolves the session cookie into a profile and role
//! once, before the handler runs, and parks the result in the request
//! extensions. Handlers receive it through the `ClientCtx` extractor and
//! never touch the session directly.

use crate::constants::GUEST_USERNAME;
use crate::db::get_db_pool;
use crate::role::Role;
use crate::user::{Actor, Profile};
use actix_session::Session;
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// What one request knows about its caller.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    /// Profile of the logged-in user. None is a guest.
    pub client: Option<Profile>,
    /// Role resolved for this request. Guests carry Role::None.
    pub role: Role,
    /// CSRF token bound to the session.
    pub csrf_token: String,
    /// When the request entered the middleware, for the footer timer.
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            role: Role::None,
            csrf_token: String::new(),
            request_start: Instant::now(),
        }
    }
}

impl ClientCtxInner {
    pub async fn from_session(session: &Session) -> Self {
        use crate::middleware::csrf::get_or_create_csrf_token;
        use crate::session::authenticate_client_by_session;

        let client = authenticate_client_by_session(session).await;

        // Role resolution is fail-closed; see crate::role.
        let role = match &client {
            Some(user) => crate::role::get_role(get_db_pool(), user.id).await,
            None => Role::None,
        };

        let csrf_token = get_or_create_csrf_token(session).unwrap_or_else(|_| String::new());

        ClientCtxInner {
            client,
            role,
            csrf_token,
            ..Default::default()
        }
    }
}

/// Handle handed to route functions. Cheap to clone; the inner data is
/// shared with the middleware that built it.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    pub async fn from_session(session: &Session) -> Self {
        Self(Data::new(ClientCtxInner::from_session(session).await))
    }

    /// Pull the context the middleware parked in the extensions, or park
    /// a fresh guest context if the request never passed through it.
    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            Some(inner) => Self(inner.clone()),
            None => {
                let inner = Data::new(ClientCtxInner::default());
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    pub fn get_id(&self) -> Option<i32> {
        self.0.client.as_ref().map(|u| u.id)
    }

    /// The user's name, or the guest label for display.
    pub fn get_name(&self) -> String {
        self.0
            .client
            .as_ref()
            .map_or_else(|| GUEST_USERNAME.to_owned(), |user| user.name.to_owned())
    }

    pub fn get_user(&self) -> Option<&Profile> {
        self.0.client.as_ref()
    }

    pub fn get_role(&self) -> Role {
        self.0.role
    }

    pub fn get_csrf_token(&self) -> &str {
        &self.0.csrf_token
    }

    pub fn is_user(&self) -> bool {
        self.0.client.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.0.role.is_admin()
    }

    /// True for any logged-in account that has been granted a role.
    pub fn is_approved(&self) -> bool {
        self.is_user() && self.0.role.is_approved()
    }

    /// The acting user for attribution, or None for guests.
    pub fn actor(&self) -> Option<Actor> {
        self.0.client.as_ref().map(|user| Actor {
            id: user.id,
            name: user.name.to_owned(),
            role: self.0.role,
        })
    }

    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.request_start
    }

    /// Elapsed time for the page footer, in whichever unit reads best.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }

    /// Returns the user id, or 401 for guests.
    pub fn require_login(&self) -> Result<i32, actix_web::Error> {
        self.get_id()
            .ok_or_else(|| actix_web::error::ErrorUnauthorized("Login required"))
    }

    /// Returns the actor for any approved account, 401 for guests, 403
    /// for accounts still waiting on approval.
    pub fn require_member(&self) -> Result<Actor, actix_web::Error> {
        self.require_login()?;
        match self.actor() {
            Some(actor) if actor.role.is_approved() => Ok(actor),
            _ => Err(actix_web::error::ErrorForbidden(
                "Your account has not been approved for access",
            )),
        }
    }

    /// Returns the actor for administrators only.
    pub fn require_admin(&self) -> Result<Actor, actix_web::Error> {
        self.require_login()?;
        match self.actor() {
            Some(actor) if actor.role.is_admin() => Ok(actor),
            _ => Err(actix_web::error::ErrorForbidden(
                "Administrator access required",
            )),
        }
    }
}

/// Extractor backing the `client: ClientCtx` parameter on route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // The Session extractor wants an HttpRequest, so the request is
        // split and reassembled around it.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        Box::pin(async move {
            match session {
                Ok(session) => req
                    .extensions_mut()
                    .insert(Data::new(ClientCtxInner::from_session(&session).await)),
                Err(err) => {
                    // Resolution failed; the handler sees a guest.
                    log::error!("Unable to extract Session data in middleware: {}", err);
                    None
                }
            };

            svc.call(req).await
        })
    }
}
