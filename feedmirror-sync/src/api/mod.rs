//! HTTP API handlers for feedmirror-sync

pub mod auth;
pub mod feed;
pub mod health;
pub mod login;
pub mod session;

pub use auth::{api_key_middleware, Session, API_KEY_HEADER};
pub use feed::{get_feed, get_user};
pub use health::health_routes;
pub use login::{login, logout};
pub use session::{SessionCodec, UserInfo, AUTH_COOKIE, USER_INFO_COOKIE};
