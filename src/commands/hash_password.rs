//! Hash-password command - Prints an Argon2 PHC string.
//!
//! Useful for seeding credentials by hand; the output verifies against the
//! server as long as the hash is stored verbatim.

use crate::cli::args::HashPasswordArgs;
use crate::config::Config;
use crate::domain::PasswordHasher;
use crate::errors::{AppError, AppResult};

/// Execute the hash-password command
pub async fn execute(args: HashPasswordArgs, config: Config) -> AppResult<()> {
    if args.password.chars().count() < config.password.min_length {
        return Err(AppError::validation(format!(
            "password: must be at least {} characters",
            config.password.min_length
        )));
    }

    let hasher = PasswordHasher::new(config.password.params)?;
    let password = tokio::task::spawn_blocking(move || hasher.hash(&args.password))
        .await
        .map_err(|e| AppError::internal(format!("Hashing task failed: {}", e)))??;

    println!("{}", password.as_str());
    Ok(())
}
