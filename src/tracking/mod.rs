pub mod events;
pub mod models;
pub mod pagination;
pub mod store;

pub use events::{ShipmentEventBus, ShipmentUpdate};
pub use store::ContainerStore;
