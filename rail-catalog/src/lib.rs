pub mod search;
pub mod seed;

pub use search::{RouteDetails, RouteSearchEngine, StopDetails};
pub use seed::{bootstrap, bootstrap_catalog, validate_seed};
