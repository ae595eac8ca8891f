//! HTTP download adapter for passes and bundles.
//!
//! Serving a pass is a boundary concern: the core produces bytes, this
//! module wraps them in an [`http::Response`] carrying the headers Wallet
//! expects. The response can be handed to any `http`-based server, or
//! written as HTTP/1.1 to whatever output channel the caller owns.

use crate::{Error, Result};
use http::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH,
    CONTENT_TYPE, PRAGMA,
};
use http::{Response, StatusCode};
use std::io::Write;

/// MIME type of a single `.pkpass` archive.
pub const PKPASS_MIME_TYPE: &str = "application/vnd.apple.pkpass";

/// MIME type of a `.pkpasses` bundle.
pub const PKPASSES_MIME_TYPE: &str = "application/vnd.apple.pkpasses";

const CONTENT_TRANSFER_ENCODING: HeaderName = HeaderName::from_static("content-transfer-encoding");

/// Check a download file name before it is placed in `Content-Disposition`.
///
/// Control characters, quotes and path separators are rejected.
pub(crate) fn check_file_name(name: &str) -> Result<()> {
    let bad = |c: char| c.is_control() || matches!(c, '"' | '\\' | '/');
    if name.is_empty() || name.chars().any(bad) {
        return Err(Error::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// A ready-to-send download response.
#[derive(Debug)]
pub struct PassResponse {
    file_name: String,
    inner: Response<Vec<u8>>,
}

impl PassResponse {
    pub(crate) fn new(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Result<Self> {
        check_file_name(file_name)?;
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
            .map_err(|_| Error::InvalidFileName(file_name.to_string()))?;

        let inner = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type))
            .header(CONTENT_DISPOSITION, disposition)
            .header(CONTENT_LENGTH, body.len())
            .header(CONTENT_TRANSFER_ENCODING, HeaderValue::from_static("binary"))
            .header(CACHE_CONTROL, HeaderValue::from_static("must-revalidate"))
            .header(PRAGMA, HeaderValue::from_static("public"))
            .body(body)?;

        Ok(Self {
            file_name: file_name.to_string(),
            inner,
        })
    }

    pub fn content_type(&self) -> &str {
        self.inner
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn body(&self) -> &[u8] {
        self.inner.body()
    }

    /// The underlying response, for servers built on the `http` types.
    pub fn into_http(self) -> Response<Vec<u8>> {
        self.inner
    }

    /// Write status line, headers and body to `out`, then flush.
    ///
    /// Consumes the response: once written, the exchange is over.
    pub fn write_to<W: Write>(self, mut out: W) -> Result<()> {
        write!(out, "{:?} {}\r\n", self.inner.version(), self.inner.status())?;
        for (name, value) in self.inner.headers() {
            out.write_all(name.as_str().as_bytes())?;
            out.write_all(b": ")?;
            out.write_all(value.as_bytes())?;
            out.write_all(b"\r\n")?;
        }
        out.write_all(b"\r\n")?;
        out.write_all(self.inner.body())?;
        out.flush()?;
        Ok(())
    }
}
