//! Paginated collection fetching with reauthentication and bounded retries.

pub mod executor;
pub mod link;
pub mod page;

pub use executor::*;
pub use link::*;
pub use page::*;
