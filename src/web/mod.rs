pub mod access;
pub mod admin;
pub mod deletion_requests;
pub mod error;
pub mod index;
pub mod infractions;
pub mod login;
pub mod logout;

/// Registers every handler. Each submodule contributes its own routes
/// through a `configure` of its own; resolution stops at the first match.
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    index::configure(conf);
    access::configure(conf);
    admin::configure(conf);
    deletion_requests::configure(conf);
    infractions::configure(conf);
    login::configure(conf);
    logout::configure(conf);

    // Registration handlers live beside the account-creation logic.
    conf.service(crate::create_user::view_register)
        .service(crate::create_user::post_register);
}
