pub mod container_routes;
pub mod event_routes;
pub mod search_routes;
