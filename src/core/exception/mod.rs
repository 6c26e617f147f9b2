pub mod error;

pub use error::{CoreError, CoreResult};
