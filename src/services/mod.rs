pub mod order;
pub mod query;
pub mod store;
pub mod token;

pub use store::*;
