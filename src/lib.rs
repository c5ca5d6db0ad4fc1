pub mod config;
pub mod connection;
pub mod exception;
pub mod listener;
pub mod param;
pub mod protocol;
pub mod request;
pub mod resource;
pub mod response;
pub mod util;

pub use config::ServerConfig;
pub use connection::Connection;
pub use exception::Exception;
pub use listener::Listener;
pub use param::{HttpRequestMethod, HttpStatus};
pub use request::Request;
pub use response::Response;
pub use util::HtmlBuilder;
