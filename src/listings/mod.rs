//! Gear listings: categories, form validation and browse filtering.

pub mod catalog;
pub mod category;
pub mod listing;

pub use catalog::{CategoryFilter, filter_by_slug};
pub use category::{Category, MEETUP_SPOTS, is_meetup_spot};
pub use listing::{Listing, NewListing, parse_price};
