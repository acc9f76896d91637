pub mod discover;
pub mod error;
pub mod result;

pub use discover::{DiscoveryOutcome, RouteDiscoverer, build_graph};
pub use error::DiscoveryError;
pub use result::PageSurvey;
