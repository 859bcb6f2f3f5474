pub mod custom_search;
pub mod google_news;
pub mod rss2json;
