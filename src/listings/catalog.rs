//! Browse-page filtering.

use crate::listings::category::Category;
use crate::listings::listing::Listing;

/// Slug that disables category filtering.
pub const ALL_SLUG: &str = "all";

/// Category filter parsed from a URL slug.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CategoryFilter {
    /// No filtering.
    All,
    /// Only one category.
    Only(Category),
    /// A slug that matches nothing.
    Unknown,
}

impl CategoryFilter {
    /// Parse the `category` query parameter. A missing parameter means `all`.
    #[must_use]
    pub fn from_slug(slug: Option<&str>) -> Self {
        match slug {
            None | Some(ALL_SLUG) => Self::All,
            Some(slug) => Category::from_slug(slug).map_or(Self::Unknown, Self::Only),
        }
    }

    /// Whether `listing` passes.
    #[must_use]
    pub fn matches(self, listing: &Listing) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => listing.category == category,
            Self::Unknown => false,
        }
    }

    /// Page heading.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::All | Self::Unknown => "All Items",
            Self::Only(category) => category.label(),
        }
    }
}

/// Keep the listings visible under `slug`, preserving order.
#[must_use]
pub fn filter_by_slug(listings: Vec<Listing>, slug: Option<&str>) -> Vec<Listing> {
    let filter = CategoryFilter::from_slug(slug);
    listings.into_iter().filter(|l| filter.matches(l)).collect()
}
