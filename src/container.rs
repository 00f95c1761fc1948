//! The proxy container: lifecycle of the downstream handler and the
//! buffered and streaming invocation entry points.

use anyhow::anyhow;
use lambda_runtime::tracing::{debug, error, info, warn};
use lambda_runtime::{Context, Diagnostic, LambdaEvent};
use serde_json::Value;
use std::any::Any;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use crate::config::{ContainerConfig, InitFailurePolicy};
use crate::decoder;
use crate::error_mapper;
use crate::handler::RequestHandler;
use crate::models::{ContainerError, HandlerError, InvocationEvent, MalformedEvent, ResponseEvent};
use crate::request::ProxyRequest;
use crate::response::{self, BodySink, BufferedBody, ResponseWriter, StreamingBody};

/// Builds the downstream handler on the first invocation.
pub type Initializer<H> = Box<dyn Fn() -> anyhow::Result<H> + Send + Sync>;

/// Process-wide handler slot.
///
/// Holds the single handler instance once it exists. Initialization runs
/// under a mutex so racing cold invocations wait for one initializer; after
/// that every invocation takes the lock-free path. The state is never reset.
pub struct ContainerState<H> {
    handler: OnceLock<Arc<H>>,
    /// First initialization failure, kept under [`InitFailurePolicy::Sticky`].
    failure: Mutex<Option<String>>,
    initializations: AtomicUsize,
}

impl<H> Default for ContainerState<H> {
    fn default() -> Self {
        Self {
            handler: OnceLock::new(),
            failure: Mutex::new(None),
            initializations: AtomicUsize::new(0),
        }
    }
}

impl<H> ContainerState<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The handler, if it has been initialized.
    #[must_use]
    pub fn get(&self) -> Option<Arc<H>> {
        self.handler.get().cloned()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handler.get().is_some()
    }

    /// How many times an initializer has been run.
    #[must_use]
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Returns the handler, running `init` if this is the first call.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Initialization`] when `init` fails or
    /// panics, or when an earlier failure is sticky.
    pub fn get_or_init<F>(&self, policy: InitFailurePolicy, init: F) -> Result<Arc<H>, ContainerError>
    where
        F: FnOnce() -> anyhow::Result<H>,
    {
        if let Some(handler) = self.handler.get() {
            return Ok(Arc::clone(handler));
        }

        // A panicking initializer never leaves the slot half-written.
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handler) = self.handler.get() {
            return Ok(Arc::clone(handler));
        }
        if let Some(ref message) = *failure {
            debug!(error = %message, "Failing fast on sticky initialization failure");
            return Err(ContainerError::Initialization(message.clone()));
        }

        info!(message = "Cold start, initializing request handler");
        self.initializations.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(init)).unwrap_or_else(|payload| {
            Err(anyhow!("initializer panicked: {}", panic_message(payload.as_ref())))
        });

        match outcome {
            Ok(handler) => {
                let handler = Arc::new(handler);
                // Only this thread can get here while holding the lock.
                let handler = Arc::clone(self.handler.get_or_init(|| handler));
                info!(
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Request handler initialized"
                );
                Ok(handler)
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(error = %message, ?policy, "Request handler initialization failed");
                if policy == InitFailurePolicy::Sticky {
                    *failure = Some(message.clone());
                }
                Err(ContainerError::Initialization(message))
            }
        }
    }
}

/// Bridges proxy invocation events to a [`RequestHandler`].
pub struct ContainerHandler<H> {
    state: Arc<ContainerState<H>>,
    initializer: Initializer<H>,
    config: ContainerConfig,
}

impl<H: RequestHandler + 'static> ContainerHandler<H> {
    /// Creates a container with default configuration and its own state.
    pub fn new<F>(initializer: F) -> Self
    where
        F: Fn() -> anyhow::Result<H> + Send + Sync + 'static,
    {
        Self::with_config(ContainerConfig::default(), initializer)
    }

    pub fn with_config<F>(config: ContainerConfig, initializer: F) -> Self
    where
        F: Fn() -> anyhow::Result<H> + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(ContainerState::new()),
            initializer: Box::new(initializer),
            config,
        }
    }

    /// Shares an existing state, so several containers use one handler.
    #[must_use]
    pub fn with_state(mut self, state: Arc<ContainerState<H>>) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ContainerConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ContainerState<H>> {
        &self.state
    }

    /// Initializes the handler if needed and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Initialization`] when the handler cannot
    /// be built.
    pub fn initialize(&self) -> Result<Arc<H>, ContainerError> {
        self.state
            .get_or_init(self.config.init_failure_policy, || (self.initializer)())
    }

    /// Handles one decoded event and returns the fully buffered response.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Initialization`] when the handler cannot
    /// be built. Every other failure becomes an error response.
    pub fn proxy(
        &self,
        event: InvocationEvent,
        context: &Context,
    ) -> Result<ResponseEvent, ContainerError> {
        let handler = self.initialize()?;
        let shape = event.shape();
        info!(
            method = event.http_method(),
            path = ?event.path(),
            shape = shape.name(),
            "Proxying request"
        );

        let mut request = match ProxyRequest::from_event(event, context, &self.config) {
            Ok(request) => request,
            Err(e) => return Ok(error_mapper::malformed_event(&e)),
        };

        let mut body = BufferedBody::default();
        let (outcome, head) = {
            let mut writer = ResponseWriter::new(&mut body, &self.config);
            let outcome = dispatch(handler.as_ref(), &mut request, &mut writer);
            (outcome, writer.into_head())
        };

        let response = match outcome {
            Ok(()) => response::to_event(&head, body.bytes(), shape, &self.config),
            Err(e) => error_mapper::handler_error(&e, shape),
        };
        info!(status = response.status_code(), "Request completed");
        Ok(response)
    }

    /// Handles raw event bytes and returns the serialized response.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Initialization`] when the handler cannot
    /// be built, or a serialization error.
    pub fn proxy_raw(&self, raw: &[u8], context: &Context) -> Result<Vec<u8>, ContainerError> {
        let response = self.proxy_decoded(decoder::decode(raw), context)?;
        Ok(serde_json::to_vec(&response)?)
    }

    /// Reads an event from `input` and writes the response to `output`
    /// while the handler produces it.
    ///
    /// The status, headers and cookies are written when the handler first
    /// writes or flushes body bytes; body bytes then go straight to
    /// `output`. If the handler fails before that, a complete error response
    /// is written instead. If it fails after, the response is closed with
    /// whatever body was produced.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Initialization`] when the handler cannot
    /// be built, or an I/O error from `input` or `output`.
    pub fn proxy_stream<R, W>(
        &self,
        mut input: R,
        mut output: W,
        context: &Context,
    ) -> Result<(), ContainerError>
    where
        R: Read,
        W: Write,
    {
        let handler = self.initialize()?;
        let mut raw = Vec::new();
        input.read_to_end(&mut raw)?;

        let request = decoder::decode(&raw)
            .and_then(|event| ProxyRequest::from_event(event, context, &self.config));
        let mut request = match request {
            Ok(request) => request,
            Err(e) => {
                serde_json::to_writer(&mut output, &error_mapper::malformed_event(&e))?;
                output.flush()?;
                return Ok(());
            }
        };
        let shape = request.shape();
        info!(
            method = %request.method(),
            path = request.path(),
            shape = shape.name(),
            "Streaming request"
        );

        let mut sink = StreamingBody::new(&mut output, shape, &self.config);
        let (outcome, head) = {
            let mut writer = ResponseWriter::new(&mut sink, &self.config);
            let outcome = dispatch(handler.as_ref(), &mut request, &mut writer);
            (outcome, writer.into_head())
        };

        match outcome {
            Ok(()) => sink.finish(&head)?,
            Err(e) if !sink.is_committed() => {
                sink.write_event(&error_mapper::handler_error(&e, shape))?;
            }
            Err(e) => {
                error!(error = %e, "Request handler failed after the response was committed");
                sink.finish(&head)?;
            }
        }
        info!(status = head.status, "Request completed");
        Ok(())
    }

    /// Lambda entry point: takes the invocation payload, returns the
    /// response event as JSON.
    ///
    /// # Errors
    ///
    /// Returns a `Diagnostic` with one of the following types:
    ///
    /// - `InitializationFailure`: the request handler could not be built
    /// - `SerializationError`: the response could not be serialized
    pub fn handle(&self, event: LambdaEvent<Value>) -> Result<Value, Diagnostic> {
        let (payload, context) = event.into_parts();
        debug!(payload = ?payload, "Received invocation");

        let response = self.proxy_decoded(decoder::decode_value(payload), &context)?;
        serde_json::to_value(&response).map_err(|e| ContainerError::from(e).into())
    }

    fn proxy_decoded(
        &self,
        decoded: Result<InvocationEvent, MalformedEvent>,
        context: &Context,
    ) -> Result<ResponseEvent, ContainerError> {
        match decoded {
            Ok(event) => self.proxy(event, context),
            Err(e) => {
                // Malformed events still count as invocations of a live container.
                self.initialize()?;
                Ok(error_mapper::malformed_event(&e))
            }
        }
    }
}

/// Runs the handler, turning a panic into a handler failure.
fn dispatch<H: RequestHandler>(
    handler: &H,
    request: &mut ProxyRequest,
    writer: &mut ResponseWriter<'_>,
) -> Result<(), HandlerError> {
    panic::catch_unwind(AssertUnwindSafe(|| handler.handle(request, writer))).unwrap_or_else(
        |payload| {
            warn!(message = "Request handler panicked");
            Err(HandlerError::Failed(anyhow!(
                "handler panicked: {}",
                panic_message(payload.as_ref())
            )))
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
