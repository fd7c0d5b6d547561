//! Small, dependency-light helpers shared across the docflow workspace:
//! typed ids, content-type sniffing and token generation. Kept separate
//! from `docflow_api` because nothing here is part of the wire contract.

pub mod id;
pub mod mime_sniff;
pub mod token;
