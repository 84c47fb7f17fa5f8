//! Listing slugs
//!
//! `<type>-<action>-<address>-<price>-<suffix>`, lowercased, every run of
//! non-alphanumeric characters collapsed to a single dash.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::data::{Action, PropertyType};

const SUFFIX_LEN: usize = 6;

/// Build a fresh slug for a listing
///
/// The random suffix makes collisions unlikely; callers still check the
/// store before using it.
pub fn generate_slug(
    property_type: PropertyType,
    action: Action,
    address: &str,
    price: f64,
) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    slugify(&format!(
        "{}-{}-{}-{}-{}",
        property_type, action, address, price, suffix
    ))
}

/// Lowercase and dash-separate arbitrary text
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(
            slugify("Residential-House-Sell-12 King St, Sydney NSW-450000"),
            "residential-house-sell-12-king-st-sydney-nsw-450000"
        );
        assert_eq!(slugify("  --Hello  World--  "), "hello-world");
    }

    #[test]
    fn generated_slug_carries_attributes_and_suffix() {
        let slug = generate_slug(
            PropertyType::LandPlot,
            Action::Sell,
            "Plot 7, Ludhiana",
            1250000.0,
        );
        assert!(slug.starts_with("land-plot-sell-plot-7-ludhiana-1250000-"));

        let suffix = slug.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert_eq!(suffix, suffix.to_lowercase());
    }

    #[test]
    fn two_slugs_for_the_same_listing_differ() {
        let a = generate_slug(PropertyType::Industrial, Action::Rent, "Unit 4", 900.0);
        let b = generate_slug(PropertyType::Industrial, Action::Rent, "Unit 4", 900.0);
        assert_ne!(a, b);
    }
}
