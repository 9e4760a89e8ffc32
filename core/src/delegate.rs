//! Default `HttpDelegate` backed by a blocking `ureq` agent.
//!
//! The agent is configured with `http_status_as_error(false)` so every
//! response, including 4xx/5xx, goes through `decode_response` and surfaces
//! as the same `ScrapydError` variants regardless of status.

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use ureq::Agent;
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::error::Result;
use crate::http::{decode_response, encode_multipart, FilePart, FormData, HttpDelegate};
use crate::types::Credentials;

#[derive(Clone)]
pub struct UreqDelegate {
    agent: Agent,
    authorization: Option<String>,
}

impl UreqDelegate {
    pub fn new() -> Self {
        Self::with_options(None, None)
    }

    /// Create a delegate that sends `credentials` as basic auth on every
    /// request and gives up on any request that exceeds `timeout`.
    pub fn with_options(credentials: Option<&Credentials>, timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            authorization: credentials.map(basic_auth),
        }
    }

    fn read(mut response: ureq::http::Response<ureq::Body>) -> Result<Value> {
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        decode_response(status, &body)
    }
}

impl Default for UreqDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqDelegate")
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}

impl HttpDelegate for UreqDelegate {
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value> {
        let mut url = Url::parse(url)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        log::debug!("GET {url}");

        let mut request = self.agent.get(url.as_str());
        if let Some(value) = &self.authorization {
            request = request.header("authorization", value.as_str());
        }
        Self::read(request.call()?)
    }

    fn post(&self, url: &str, form: &FormData, files: &[FilePart]) -> Result<Value> {
        log::debug!("POST {url} ({} fields, {} files)", form.fields().len(), files.len());

        let mut request = self.agent.post(url);
        if let Some(value) = &self.authorization {
            request = request.header("authorization", value.as_str());
        }

        let response = if files.is_empty() {
            let body = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(form.fields())
                .finish();
            request
                .content_type("application/x-www-form-urlencoded")
                .send(body.as_bytes())?
        } else {
            let boundary = format!("scrapyd-{}", Uuid::new_v4().simple());
            let body = encode_multipart(form, files, &boundary);
            request
                .content_type(format!("multipart/form-data; boundary={boundary}"))
                .send(&body[..])?
        };
        Self::read(response)
    }
}

fn basic_auth(credentials: &Credentials) -> String {
    let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
    format!("Basic {token}")
}
