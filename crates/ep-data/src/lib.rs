pub mod cache;
pub mod providers;
pub mod yahoo;

pub use cache::*;
pub use providers::*;
pub use yahoo::*;
