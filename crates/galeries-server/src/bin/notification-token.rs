//! Print a token for services that post to `POST /notifications`.
//!
//! Reads the same environment as the server so the token is signed with the
//! server's key.

use galeries_server::config::Config;

fn main() {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error loading config: {:#}", e);
        std::process::exit(1);
    });

    let token = config
        .jwt
        .load_keys()
        .and_then(|keys| keys.issue_notification())
        .unwrap_or_else(|e| {
            eprintln!("Error issuing token: {:#}", e);
            std::process::exit(1);
        });

    println!("\n# Send this in the `notificationtoken` header:");
    println!("{}", token);
}
