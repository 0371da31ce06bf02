//! Listing model and form validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::errors::{GearError, GearResult};
use crate::common::ids::{ListingId, ParticipantId};
use crate::listings::category::{Category, is_meetup_spot};

/// A published rental listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Store-assigned identifier.
    pub id: ListingId,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Gear category.
    pub category: Category,
    /// Daily price.
    pub price_per_day: f64,
    /// Meetup spot for hand-over.
    pub pickup_location: String,
    /// Uploaded image URLs.
    pub images: Vec<String>,
    /// Owner token.
    pub owner_id: ParticipantId,
    /// Owner display name at listing time.
    pub owner_name: String,
    /// Owner avatar at listing time.
    pub owner_avatar: Option<String>,
    /// Whether the item can currently be rented.
    pub available: bool,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
}

/// Listing form input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Gear category.
    pub category: Category,
    /// Daily price.
    pub price_per_day: f64,
    /// Meetup spot for hand-over.
    pub pickup_location: String,
    /// Image URLs already uploaded to blob storage.
    pub images: Vec<String>,
}

impl NewListing {
    /// Validate the form.
    ///
    /// # Errors
    /// Returns `InvalidInput` if a field is missing or out of range.
    pub fn validate(&self) -> GearResult<()> {
        if self.title.trim().is_empty() {
            return Err(GearError::invalid("listing title is empty"));
        }
        if self.description.trim().is_empty() {
            return Err(GearError::invalid("listing description is empty"));
        }
        if !self.price_per_day.is_finite() || self.price_per_day <= 0.0 {
            return Err(GearError::invalid(format!(
                "price per day must be positive, got {}",
                self.price_per_day
            )));
        }
        if !is_meetup_spot(&self.pickup_location) {
            return Err(GearError::invalid(format!(
                "unknown pickup location: {}",
                self.pickup_location
            )));
        }
        if self.images.iter().any(|url| url.trim().is_empty()) {
            return Err(GearError::invalid("image url is empty"));
        }
        Ok(())
    }
}

/// Parse the price field of the listing form.
///
/// # Errors
/// Returns `InvalidInput` if the value is not a positive number.
pub fn parse_price(raw: &str) -> GearResult<f64> {
    let price: f64 = raw
        .trim()
        .trim_start_matches('$')
        .parse()
        .map_err(|_| GearError::invalid(format!("invalid price: {raw:?}")))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(GearError::invalid(format!("invalid price: {raw:?}")));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewListing {
        NewListing {
            title: "Trek FX 3".to_string(),
            description: "Hybrid bike, medium frame".to_string(),
            category: Category::Bicycles,
            price_per_day: 25.0,
            pickup_location: "Green Lake Park".to_string(),
            images: vec!["https://img.example/bike.jpg".to_string()],
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_fields() {
        let mut listing = form();
        listing.title = "  ".to_string();
        assert!(listing.validate().is_err());

        let mut listing = form();
        listing.price_per_day = 0.0;
        assert!(listing.validate().is_err());

        let mut listing = form();
        listing.price_per_day = f64::NAN;
        assert!(listing.validate().is_err());

        let mut listing = form();
        listing.pickup_location = "My garage".to_string();
        assert!(listing.validate().is_err());
    }

    #[test]
    fn test_parse_price() {
        assert!((parse_price("12.5").unwrap() - 12.5).abs() < f64::EPSILON);
        assert!((parse_price(" $40 ").unwrap() - 40.0).abs() < f64::EPSILON);
        assert!(parse_price("").is_err());
        assert!(parse_price("-3").is_err());
        assert!(parse_price("abc").is_err());
    }
}
