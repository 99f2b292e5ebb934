//! Token Issuer - Device-bound short-lived auth tokens

pub mod issuer;

pub use issuer::{AuthToken, TokenIssuer};
