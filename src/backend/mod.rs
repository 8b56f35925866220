//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! DispatchEndpoint
//!     → dispatcher.rs (pick transport, bind deadline/cancellation)
//!     → transport.rs (BackendTransport seam)
//!     → grpc.rs + codec.rs (unary call over a shared tonic Channel)
//!     ← error.rs (status → BackendError → client status)
//! ```

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod grpc;
pub mod transport;

pub use dispatcher::{Dispatcher, DispatcherError};
pub use error::{BackendError, BackendErrorKind};
pub use grpc::GrpcTransport;
pub use transport::{BackendCall, BackendTransport};
