//! Purpose: Build, send, and render HTTP requests for the `quill` CLI.
//! Exports: `Method`, `RequestDetails`, `ResponseData`, `send`, `format_json`, renderers.
//! Role: Collaborator layer over the record store; holds no persistent state.
//! Invariants: A non-2xx status is response data, not a transport error.
//! Invariants: JSON pretty-printing falls back to the raw body, never drops it.

use clap::ValueEnum;
use url::Url;

use crate::core::error::{Error, ErrorKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Parses a method name from free text (the editor buffer). Case does
    /// not matter; anything outside the allowed set is a usage error.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "PUT" => Ok(Method::Put),
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported method \"{other}\""))
                .with_hint("Use GET, PUT, POST, PATCH, or DELETE.")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestDetails {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RequestDetails {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }
}

#[derive(Clone, Debug)]
pub struct ResponseData {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Validates the request URL, defaulting the scheme to `http://` when none
/// was given.
pub fn resolve_url(raw: &str) -> Result<Url, Error> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    Url::parse(&candidate).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid url \"{raw}\""))
            .with_source(err)
    })
}

/// Sends the request over a fresh agent and collects the full response.
/// Only transport-level failures (DNS, connect, TLS) are errors here.
pub fn send(req: &RequestDetails) -> Result<ResponseData, Error> {
    let url = resolve_url(&req.url)?;
    let agent = ureq::AgentBuilder::new().build();
    let mut call = agent.request(req.method.as_str(), url.as_str());
    for (name, value) in &req.headers {
        call = call.set(name, value);
    }
    tracing::debug!(method = req.method.as_str(), url = %url, "sending request");

    let result = if req.body.is_empty() {
        call.call()
    } else {
        call.send_string(&req.body)
    };
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(Error::new(ErrorKind::Http)
                .with_message(format!("request failed: {transport}")));
        }
    };

    let status = response.status();
    let status_text = response.status_text().to_string();
    let mut headers = Vec::new();
    for name in response.headers_names() {
        if let Some(value) = response.header(&name) {
            let value = value.to_string();
            headers.push((name, value));
        }
    }
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;

    Ok(ResponseData {
        status,
        status_text,
        headers,
        body,
    })
}

/// Pretty-prints a JSON document. Invalid JSON is a usage error so the CLI
/// can point at `--raw`.
pub fn format_json(data: &str) -> Result<String, Error> {
    let value: serde_json::Value = serde_json::from_str(data).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("response data is not valid JSON")
            .with_hint("Use --raw to display the body unformatted.")
            .with_source(err)
    })?;
    serde_json::to_string_pretty(&value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to render JSON")
            .with_source(err)
    })
}

pub fn render_request(req: &RequestDetails) -> String {
    let mut out = String::from("#### REQUEST INFO ####\n");
    out.push_str(&format!("{} {}\n", req.method.as_str(), req.url));
    for (name, value) in &req.headers {
        out.push_str(&format!("{name}: {value}\n"));
    }
    if !req.body.is_empty() {
        let body = format_json(&req.body).unwrap_or_else(|_| req.body.clone());
        out.push_str(&body);
        out.push('\n');
    }
    out
}

pub fn render_response(resp: &ResponseData, verbose: bool, format: bool) -> String {
    let mut out = String::new();
    if verbose {
        out.push_str("#### RESPONSE INFO ####\n");
        out.push_str(&format!("Status: {} {}\n", resp.status, resp.status_text));
        for (name, value) in &resp.headers {
            out.push_str(&format!("{name}: {value}\n"));
        }
    }

    if !resp.is_success() {
        out.push_str(&format!("Failed with: {} {}\n", resp.status, resp.status_text));
    }
    if !resp.body.is_empty() {
        let body = if format {
            format_json(&resp.body).unwrap_or_else(|_| resp.body.clone())
        } else {
            resp.body.clone()
        };
        out.push_str(&body);
    }
    out
}
