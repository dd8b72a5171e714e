mod address;
mod coordinates;
mod position;
mod route;

pub use address::Address;
pub use coordinates::{Coordinates, EARTH_RADIUS_KM};
pub use position::{PositionSample, TrackedPosition};
pub use route::DecodedRoute;
