//! Errors raised inside reactive computations and the channel they are
//! reported on.

use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::RwLock;

use super::SubscriberId;

/// A failure inside an effect or computed body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputationError {
    /// A fallible body returned an error.
    #[error("computation {id} failed: {message}")]
    Failed { id: SubscriberId, message: String },

    /// The body panicked; the panic was caught at the computation boundary.
    #[error("computation {id} panicked: {message}")]
    Panicked { id: SubscriberId, message: String },

    /// Depth-first propagation nested deeper than the configured limit,
    /// which almost always means a write/read cycle between computations.
    #[error("computation {id} exceeded the nested update limit of {limit}")]
    DepthExceeded { id: SubscriberId, limit: usize },
}

impl ComputationError {
    /// The computation that failed.
    pub fn id(&self) -> SubscriberId {
        match self {
            Self::Failed { id, .. } | Self::Panicked { id, .. } | Self::DepthExceeded { id, .. } => {
                *id
            }
        }
    }

    pub(crate) fn from_panic(id: SubscriberId, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { id, message }
    }
}

/// Callback receiving run-time computation failures.
pub type ErrorHandler = Rc<dyn Fn(&ComputationError)>;

type DefaultHandler = Arc<dyn Fn(&ComputationError) + Send + Sync>;

static DEFAULT_HANDLER: RwLock<Option<DefaultHandler>> = RwLock::new(None);

/// Install the process-wide fallback handler.
///
/// It receives failures from computations whose runtime has no handler of
/// its own. Without one, failures are logged with `tracing::error!`.
pub fn set_default_error_handler<F>(handler: F)
where
    F: Fn(&ComputationError) + Send + Sync + 'static,
{
    *DEFAULT_HANDLER.write() = Some(Arc::new(handler));
}

/// Remove the process-wide fallback handler.
pub fn clear_default_error_handler() {
    *DEFAULT_HANDLER.write() = None;
}

pub(crate) fn report_to_default(error: &ComputationError) {
    // Clone out so the lock is not held while the handler runs.
    let handler = DEFAULT_HANDLER.read().clone();
    match handler {
        Some(handler) => handler(error),
        None => tracing::error!(computation = %error.id(), %error, "unhandled computation error"),
    }
}
