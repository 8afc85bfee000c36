//! Maps resolution outcomes and parse failures to responses.
//!
//! | outcome                  | status |
//! |--------------------------|--------|
//! | regular file             | 200    |
//! | directory                | 200    |
//! | not found / unreadable   | 404    |
//! | forbidden                | 403    |
//! | head too large           | 413    |
//! | malformed request        | 400    |
//! | unsupported method etc.  | 501    |
//! | file vanished on open    | 500    |
//! | handler panic            | 500    |
//!
//! HEAD gets the same headers as GET would, without a body.

use std::future::Future;

use tokio::fs::File;

use crate::files::ResolvedResource;
use crate::files::listing;
use crate::http::parser::ParseError;
use crate::http::request::Method;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

pub const SERVER_NAME: &str = concat!("torero-serve/", env!("CARGO_PKG_VERSION"));

/// Builds the response for a resolved resource.
pub async fn for_resource(resource: ResolvedResource, method: &Method) -> Response {
    let response = match resource {
        ResolvedResource::RegularFile { path, size, mime } => match File::open(&path).await {
            Ok(file) => ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", mime)
                .file(file, size)
                .build(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "resolved file could not be opened");
                Response::internal_error()
            }
        },
        ResolvedResource::Directory {
            segments, entries, ..
        } => ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(listing::render(&segments, &entries))
            .build(),
        ResolvedResource::NotFound => Response::not_found(),
        ResolvedResource::Forbidden => Response::forbidden(),
    };

    if *method == Method::HEAD {
        response.without_body()
    } else {
        response
    }
}

/// Runs `work` in its own task so a panic while building a response
/// becomes a 500 instead of a dropped connection.
pub async fn guarded<F>(work: F) -> Response
where
    F: Future<Output = Response> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "response handler panicked");
            Response::internal_error()
        }
    }
}

/// Builds the error response for a request that could not be parsed.
pub fn for_parse_error(err: &ParseError) -> Response {
    match err {
        ParseError::TooLarge { limit } => Response::text(
            StatusCode::PayloadTooLarge,
            &format!("Request exceeds the {} byte limit.", limit),
        ),
        ParseError::Unsupported(what) => Response::text(
            StatusCode::NotImplemented,
            &format!("Not supported: {}.", what),
        ),
        ParseError::Malformed(reason) => Response::text(
            StatusCode::BadRequest,
            &format!("Malformed request: {}.", reason),
        ),
        ParseError::Incomplete => Response::text(StatusCode::BadRequest, "Incomplete request."),
    }
}

/// Stamps the headers every response carries.
pub fn finalize(mut response: Response, keep_alive: bool) -> Response {
    response.set_header("Server", SERVER_NAME);
    response.set_header("Connection", if keep_alive { "keep-alive" } else { "close" });
    response
}
