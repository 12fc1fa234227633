pub mod analyzer;
pub mod function;

pub use analyzer::*;
pub use function::*;
