pub mod applications;
pub mod offers;
pub mod store;
pub mod tracking;

pub use store::MarketplaceStore;
