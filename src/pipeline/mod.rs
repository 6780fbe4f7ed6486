pub mod extraction;
pub mod normalize;
pub mod notify;
pub mod processor;
pub mod retry;
pub mod store;
