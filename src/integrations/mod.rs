//! External service integrations.

pub mod report_client {
    pub use crate::report_client::*;
}

pub mod cache_store {
    pub use crate::cache_store::*;
}
