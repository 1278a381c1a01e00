//! Clients for the league stats APIs and the odds archive feed

pub mod http;
pub mod nba;
pub mod nhl;
pub mod oddsfeed;

pub use nba::NbaClient;
pub use nhl::NhlClient;
pub use oddsfeed::OddsFeedClient;
