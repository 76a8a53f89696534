//! # smilecdr
//!
//! Client for the Smile CDR admin JSON API.
//!
//! This crate provides:
//! - A [`Transport`] seam with a Basic-auth HTTP implementation and an
//!   in-memory [`MockTransport`] for tests
//! - Typed entities ([`ModuleConfig`], [`OpenIdClient`],
//!   [`OpenIdIdentityProvider`], [`User`]) and the [`Client`] calls that
//!   read and write them
//! - The option mapper that turns a typed attribute table into a module's
//!   `{key, value}` option list and back
//!
//! ## Example
//!
//! ```no_run
//! use smilecdr::Client;
//!
//! let client = Client::http("http://localhost:9000", "admin", "password")
//!     .expect("valid base URL");
//!
//! let config = client.get_module_config("Master", "smart_auth")
//!     .expect("module exists");
//! println!("{} has {} options", config.module_id, config.options.len());
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod error;
pub mod model;
pub mod options;
pub mod transport;

pub use api::Client;
pub use error::{Error, ErrorCategory, Result};
pub use model::{
    ClientSecret, ModuleConfig, ModuleDependency, ModuleOption, OpenIdClient,
    OpenIdIdentityProvider, Permission, User,
};
pub use options::{from_module_config, to_module_config};
pub use transport::{
    Call, DEFAULT_BASE_URL, HttpTransport, Method, MockTransport, Transport, basic_auth,
    normalize_base_url,
};
