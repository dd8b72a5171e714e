mod geocoding;
mod route_provider;
mod session;
mod tracker;

pub use geocoding::GeocodingAdapter;
pub use route_provider::{RouteOutcome, RouteProvider};
pub use session::{Phase, RouteSession, SessionEvent, SessionState};
pub use tracker::{LocationTracker, TrackerEvent};
