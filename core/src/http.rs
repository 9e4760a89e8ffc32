//! The HTTP capability the façade delegates to, plus the plain-data request
//! pieces shared by every delegate.
//!
//! # Design
//! `ScrapydApi` never talks to the network itself. It resolves a URL, builds
//! a `FormData` (and, for uploads, `FilePart`s) and hands them to an
//! `HttpDelegate`, which returns the decoded JSON body. Anything the delegate
//! reports as an error reaches the caller untouched.
//!
//! `encode_multipart` and `decode_response` are the wire-level halves of the
//! default delegate, kept here as pure functions so custom delegates can
//! reuse them and so they can be tested without I/O.

use serde_json::Value;

use crate::error::{Result, ScrapydError};

/// Minimal HTTP capability: one GET and one POST, each returning the decoded
/// response body.
pub trait HttpDelegate {
    /// GET `url` with `params` appended as query parameters.
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value>;

    /// POST `form` to `url`. When `files` is non-empty the request is sent as
    /// `multipart/form-data`, otherwise as a urlencoded form.
    fn post(&self, url: &str, form: &FormData, files: &[FilePart]) -> Result<Value>;
}

impl<T: HttpDelegate + ?Sized> HttpDelegate for &T {
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value> {
        (**self).get(url, params)
    }

    fn post(&self, url: &str, form: &FormData, files: &[FilePart]) -> Result<Value> {
        (**self).post(url, form, files)
    }
}

/// Ordered form fields. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value stored under `key` with a single `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.remove(&key);
        self.fields.push((key, value.into()));
    }

    /// Add another value under `key`, keeping existing ones.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn remove(&mut self, key: &str) {
        self.fields.retain(|(k, _)| k != key);
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single file field of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content: Vec<u8>,
}

impl FilePart {
    pub fn new(name: impl Into<String>, filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            content,
        }
    }
}

/// Encode `form` and `files` as a `multipart/form-data` body delimited by
/// `boundary`. The matching content type is
/// `multipart/form-data; boundary={boundary}`.
pub fn encode_multipart(form: &FormData, files: &[FilePart], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in form.fields() {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", quote(name)).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for file in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                quote(&file.name),
                quote(&file.filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(&file.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn quote(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

/// Turn a raw status and body into the decoded response object.
///
/// Non-2xx statuses become `Http`, bodies that are not JSON become
/// `InvalidJson`, and `{"status": "error"}` objects become `Response`. An
/// `"ok"` status member is stripped before the object is returned.
pub fn decode_response(status: u16, body: &str) -> Result<Value> {
    if !(200..300).contains(&status) {
        return Err(ScrapydError::Http {
            status,
            body: body.to_string(),
        });
    }
    let mut json: Value = serde_json::from_str(body).map_err(|source| ScrapydError::InvalidJson {
        body: body.to_string(),
        source,
    })?;

    if let Some(object) = json.as_object_mut() {
        match object.get("status").and_then(Value::as_str) {
            Some("ok") => {
                object.remove("status");
            }
            Some("error") => {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| body.to_string());
                return Err(ScrapydError::Response(message));
            }
            _ => {}
        }
    }
    Ok(json)
}
