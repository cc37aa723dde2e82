mod seasons_routes;

pub use seasons_routes::*;
