pub mod config;
pub mod error;
pub mod filename;
pub mod model;
pub mod server;
pub mod store;

pub use error::{StoreError, SubmitError};
pub use filename::derive_filename;
pub use model::{ProfileSubmission, RecordRow};
pub use store::RecordStore;
