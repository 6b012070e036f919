//! Discovery service adapter.

mod dto;
mod http_client;
mod range_search;

pub use http_client::HttpDiscoveryClient;
pub use range_search::find_upper_bound;
