pub mod github_feed;

pub use github_feed::GithubFeedSource;
