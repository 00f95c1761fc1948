//! The contract between the container and the downstream web framework.

use crate::models::HandlerError;
use crate::request::ProxyRequest;
use crate::response::ResponseWriter;

/// A downstream request handler: typically an embedded framework's
/// dispatcher, constructed once per process and shared by every invocation.
///
/// Handlers populate the writer and return `Ok(())`. Returning
/// [`HandlerError::Unroutable`] produces a 404; any other error (or a panic)
/// produces a 500.
pub trait RequestHandler: Send + Sync {
    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when no route matches or handling fails.
    fn handle(
        &self,
        request: &mut ProxyRequest,
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError>;
}

impl<F> RequestHandler for F
where
    F: Fn(&mut ProxyRequest, &mut ResponseWriter<'_>) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(
        &self,
        request: &mut ProxyRequest,
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        self(request, response)
    }
}
