pub mod documents;
pub mod kind;
pub mod probe;
pub mod validator;

pub use kind::*;
pub use probe::*;
pub use validator::*;
