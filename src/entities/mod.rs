// Entity Models
// Each entity has a stable UUID identity plus values that imports may reconcile.

pub mod corporation;
pub mod location;

pub use corporation::{Corporation, CorporationKey};
pub use location::{Country, Location, LOCATION_FIELDS};
