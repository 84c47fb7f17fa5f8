//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the database and the external collaborators
//! (geocoder, image pipeline, notifier).

mod account;
mod enquiry;
mod input;
mod listing;
mod search;
mod slug;
mod wishlist;

#[cfg(test)]
pub(crate) mod test_support;

pub use account::{AccountService, LoginResponse, ProfileForm, RESET_REQUESTED_MESSAGE, is_valid_email};
pub use enquiry::EnquiryService;
pub use listing::{
    BROWSE_PAGE_SIZE, ListingDetail, ListingInput, ListingPage, ListingService, ListingView,
    PricingInput, PropertyDetailsInput,
};
pub use search::{
    AppliedFilters, AreaRange, DetailFilters, LegalFilters, LocationPreferences,
    SEARCH_PAGE_SIZE, SearchFilters, SearchQuery, SearchResults, SearchService, build_query,
};
pub use wishlist::{WishlistService, WishlistToggle};
