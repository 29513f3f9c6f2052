//! Prints an argon2 hash for the given password, using the application's
//! SALT secret. Useful for seeding the first administrator account by hand:
//! registration only creates unapproved users, so the initial admin row has
//! to be inserted directly.
//!
//!     cargo run --example hash_password -- 'hunter2'

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};

fn main() {
    dotenv::dotenv().ok();

    let password = match std::env::args().nth(1) {
        Some(password) => password,
        None => {
            eprintln!("usage: hash_password <password>");
            std::process::exit(2);
        }
    };
    let salt = SaltString::generate(&mut OsRng);

    // Must match the secret the server hashes with.
    let secret = std::env::var("SALT").expect("SALT env var required");
    let argon2 = Argon2::new_with_secret(
        secret.as_bytes(),
        argon2::Algorithm::default(),
        argon2::Version::default(),
        argon2::Params::default(),
    )
    .expect("Failed to create Argon2");

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();
    println!("{}", hash);
}
