//! Request extractors that reject with the ledger's error envelope
//!
//! axum's own `Json`, `Path` and `Query` reject with plain text. These
//! wrappers run the same extraction and turn a rejection into
//! `AppError::Validation`, so malformed input gets the JSON body every
//! other client error uses.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query string parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
