pub mod browser;
pub mod crawler;
pub mod page;
pub mod realtor;
pub mod traits;
pub mod types;
pub mod zillow;

#[cfg(test)]
pub mod testing;

pub use browser::ChromePage;
pub use page::PageSource;
pub use realtor::RealtorProvider;
pub use traits::ListingProvider;
pub use types::{CrawlConfig, SearchQuery};
pub use zillow::ZillowProvider;
