//! Identity and token retrieval.
//!
//! The panel does not authenticate users itself: an external token service
//! hands out an identity together with a bearer token for the calling backend.

pub mod token;

pub use token::{Credentials, HttpTokenProvider, TokenProvider};
