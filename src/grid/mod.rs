/// Entity graph storage
pub mod store;

pub use store::EntityStore;
