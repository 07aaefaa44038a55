pub mod loader;
pub mod logging;
pub mod policy;

pub use loader::{TaxSlabLoader, TaxSlabLoaderError, TaxSlabRecord};
pub use policy::{PolicyError, load_policy, parse_policy};
