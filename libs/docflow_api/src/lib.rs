//! Wire types shared between the docflow service and its callers: the job
//! kind/status enums, the error taxonomy, and request/response DTOs. Kept
//! dependency-light (serde only, plus `utils` for ids) so it can be reused
//! by a client crate without pulling in axum or diesel.

pub mod error;
pub mod kind;
pub mod requests;
pub mod responses;
pub mod status;

pub use error::ErrorKind;
pub use kind::JobKind;
pub use status::JobStatus;
