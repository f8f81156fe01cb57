pub mod listing;

pub use listing::{ListingError, assemble_listing};
