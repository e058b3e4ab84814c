// Pure document transformations and shared errors
pub mod optimizer {
    pub use crate::optimizer::*;
}

pub mod dashboard {
    pub use crate::dashboard::*;
}

pub mod comparison {
    pub use crate::comparison::*;
}

pub mod errors {
    pub use crate::errors::*;
}
