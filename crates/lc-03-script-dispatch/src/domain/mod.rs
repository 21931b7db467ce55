//! Domain layer: keys, requests, responses and outcome translation.

pub mod outcome;
pub mod request;
pub mod script_key;
