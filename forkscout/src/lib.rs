pub mod config;
pub mod corpus;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod results;
pub mod search;

pub use config::SearchConfig;
pub use corpus::{Document, Pattern};
pub use errors::{SearchError, SearchResult};
pub use results::{MatchRecord, ResultAggregator, SearchReport, SearchResultSet};
pub use search::{search, SearchOptions, Searcher};
