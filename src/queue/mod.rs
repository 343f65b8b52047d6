//! Intake side of the pipeline: validated requests and the pending queue.

pub mod intake;
pub mod request;

pub use self::intake::{Admission, IntakeQueue};
pub use self::request::{RequestError, TestRequest};
