//! Error taxonomy and the pipeline that turns failures into HTTP responses

pub mod dispatch;
pub mod failure;
pub mod kind;
pub mod log_context;
pub mod problem;
pub mod validation;

pub use dispatch::{Decision, ErrorDispatcher};
pub use failure::{require_header, require_param, ApiError, Failure};
pub use kind::ErrorKind;
pub use log_context::{LogSink, Severity, TracingSink};
pub use problem::{LegacyEnvelope, ProblemDocument, ProblemFormatter, ResponseFormat};
pub use validation::{BindingResult, ConstraintViolation, ValidationError};
