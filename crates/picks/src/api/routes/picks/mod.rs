mod picks_routes;

pub use picks_routes::*;
