pub mod error;
pub mod event;
pub mod response;

pub use error::{ContainerError, HandlerError, MalformedEvent};
pub use event::*;
pub use response::*;
