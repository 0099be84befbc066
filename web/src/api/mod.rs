pub mod proxy;
pub mod result;
pub mod sync;
