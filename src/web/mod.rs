//! Web container integration surface.
//!
//! This module is the boundary between the hosting HTTP container and the
//! realm adapter:
//! - [`HttpRequest`] and [`HttpResponse`] are the capability traits the
//!   container implements for its own request/response types
//! - [`RequestAdapter`] and [`ResponseRecorder`] are owned implementations
//!   for containers without their own types, and for tests
//!
//! # Integration Model
//!
//! ```text
//! container request ──► HttpRequest ──► RealmAdapter::pre_authenticate_check
//!                                        RealmAdapter::authenticate
//!                                        RealmAdapter::has_resource_permission
//!                                        RealmAdapter::post_authenticate
//! container response ◄── HttpResponse ◄──┘
//! ```
//!
//! The adapter does not own the request lifecycle; it only reads the
//! request, annotates it (principal, auth type, cached provider state) and
//! writes error, redirect and header outcomes into the response.

mod adapter;
mod extract;
mod response;

pub use adapter::RequestAdapter;
pub use extract::{HttpRequest, HttpResponse};
pub use response::ResponseRecorder;
