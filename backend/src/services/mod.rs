pub mod ratings;

pub use ratings::{GoodreadsClient, RatingSource, ThirdPartyRatings};
