mod builder;
mod http_client;

pub use builder::HttpClientBuilder;
pub use http_client::HttpClient;
