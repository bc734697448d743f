pub mod curl;
pub mod data;
pub mod http;
