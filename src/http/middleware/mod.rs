//! Pipeline stages, in the order the standard pipeline runs them.

pub mod cors;
pub mod recovery;
pub mod request_id;
pub mod access_log;
pub mod deadline;
pub mod rate_limit;
pub mod auth;
