//! Runs a synchronous request/response web handler behind the gateway and
//! load balancer proxy integrations of a Lambda function.
//!
//! ```text
//! event bytes -> decoder -> InvocationEvent -> ProxyRequest
//!     -> RequestHandler(ProxyRequest, ResponseWriter) -> ResponseEvent -> bytes
//! ```

pub mod config;
pub mod container;
pub mod cookie;
pub mod decoder;
pub mod error_mapper;
pub mod handler;
pub mod models;
pub mod multimap;
pub mod request;
pub mod response;
pub mod router;

pub use config::{ContainerConfig, InitFailurePolicy};
pub use container::{ContainerHandler, ContainerState};
pub use handler::RequestHandler;
pub use cookie::{Cookie, SameSite};
pub use models::{ContainerError, EventShape, HandlerError, InvocationEvent, ResponseEvent};
pub use multimap::MultiValueMap;
pub use request::ProxyRequest;
pub use response::ResponseWriter;
pub use router::Router;
