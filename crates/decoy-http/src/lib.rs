//! Decoy: a programmable HTTP mock and proxy server.
//!
//! Expectations pair a request pattern with an action. Incoming requests are
//! matched against the highest-priority active expectation and its action
//! responds, forwards, renders a template, calls back, breaks the connection
//! or fires webhooks.
//!
//! # Module Structure
//!
//! - `model` - expectations, requests, responses, bodies and actions
//! - `predicate` - request and body matching
//! - `store` - expectation store and request log
//! - `action` - action execution, outbound client, templates, callbacks, webhooks
//! - `server` - listener and connection handling
//! - `admin_api` - control-plane endpoints under `/mockserver/`
//! - `config` - YAML configuration

pub mod action;
pub mod admin_api;
pub mod config;
pub mod model;
pub mod predicate;
pub mod server;
pub mod store;

pub use server::MockServer;
