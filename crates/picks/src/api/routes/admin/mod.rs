mod admin_routes;

pub use admin_routes::*;
