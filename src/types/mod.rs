pub mod error;

pub use error::{FragmentError, ReportError, RequestError, Result};
