pub mod auth;
pub mod beta_keys;
pub mod black_lists;
pub mod error;
pub mod extract;
pub mod frames;
pub mod galeries;
pub mod middleware;
pub mod notifications;
pub mod reports;
pub mod router;
pub mod state;
pub mod tickets;
pub mod tokens;
pub mod users;
pub mod validation;
pub mod views;

pub use router::router;
pub use state::{AppState, AppStateInner};
