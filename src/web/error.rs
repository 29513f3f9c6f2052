use actix_web::body::BoxBody;
use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result};
use askama::Template;

#[derive(Template)]
#[template(path = "errors/error.html")]
struct ErrorTemplate<'a> {
    code: u16,
    title: &'a str,
    message: &'a str,
}

/// Replaces an error response's body with a rendered error page.
///
/// The original body is discarded. Handlers that need to surface a
/// specific message to the client should redirect with a notice instead
/// of relying on these pages.
fn render_error<B>(
    res: ServiceResponse<B>,
    title: &str,
    message: &str,
) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let body = ErrorTemplate {
        code: status.as_u16(),
        title,
        message,
    }
    .render()
    .unwrap_or_else(|err| {
        log::error!("Failed to render error page for {}: {}", status, err);
        format!("{} {}", status.as_u16(), title)
    });

    let (req, _) = res.into_parts();
    let res: HttpResponse<BoxBody> = HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body);

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, res).map_into_right_body(),
    ))
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(
        res,
        "Bad Request",
        "The request could not be processed. Check the form and try again.",
    )
}

pub fn render_403<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(
        res,
        "Access Denied",
        "Your account does not have permission to do that.",
    )
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "Not Found", "That page does not exist.")
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(
        res,
        "Server Error",
        "Something went wrong on our end. The error has been logged.",
    )
}
