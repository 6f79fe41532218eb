// XML API HTTP client
//
// Wraps `reqwest::Client` with PAN-OS request encoding (form-encoded
// `type`/`action`/`xpath`/`element` parameters posted to `/api/`) and
// `<response status="...">` envelope unwrapping. Endpoint groups such as
// system operations live in sibling modules as inherent methods.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::{CODE_OBJECT_NOT_PRESENT, CODE_SESSION_TIMEOUT, CODE_UNAUTHORIZED, Error};
use crate::transport::TransportConfig;
use crate::xml::{self, XmlNode};

const API_KEY_HEADER: &str = "X-PAN-KEY";

/// Position keyword accepted by the `move` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveWhere {
    Top,
    Bottom,
    Before,
    After,
}

impl MoveWhere {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// One operation inside a `multi-config` request.
///
/// The appliance applies the whole batch in order and, with strict
/// transactions enabled, rolls every step back if any one fails.
#[derive(Debug, Clone, PartialEq)]
pub enum MultiConfigOp {
    /// Merge `element` into the node at `xpath`.
    Set { xpath: String, element: XmlNode },
    /// Replace the node at `xpath` with `element`.
    Edit { xpath: String, element: XmlNode },
    /// Remove the node at `xpath`.
    Delete { xpath: String },
    /// Reorder the entry at `xpath` within its parent list.
    Move {
        xpath: String,
        whence: MoveWhere,
        dst: Option<String>,
    },
}

impl MultiConfigOp {
    fn to_node(&self, id: usize) -> XmlNode {
        let id = id.to_string();
        match self {
            Self::Set { xpath, element } => XmlNode::new("set")
                .with_attr("id", id)
                .with_attr("xpath", xpath.as_str())
                .with_child(element.clone()),
            Self::Edit { xpath, element } => XmlNode::new("edit")
                .with_attr("id", id)
                .with_attr("xpath", xpath.as_str())
                .with_child(element.clone()),
            Self::Delete { xpath } => XmlNode::new("delete")
                .with_attr("id", id)
                .with_attr("xpath", xpath.as_str()),
            Self::Move { xpath, whence, dst } => {
                let mut node = XmlNode::new("move")
                    .with_attr("id", id)
                    .with_attr("xpath", xpath.as_str())
                    .with_attr("where", whence.as_str());
                if let Some(dst) = dst {
                    node = node.with_attr("dst", dst.as_str());
                }
                node
            }
        }
    }
}

/// Raw HTTP client for the PAN-OS XML API.
///
/// Every call is a form-encoded `POST {base}/api/`. Successful calls return
/// the `<result>` element (or an empty node when the appliance omits it);
/// error envelopes are mapped onto [`Error`] variants.
pub struct XmlApiClient {
    http: reqwest::Client,
    base_url: Url,
    /// API key sent as `X-PAN-KEY`. Populated from configuration or keygen.
    api_key: RwLock<Option<SecretString>>,
}

impl XmlApiClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the management interface root, e.g.
    /// `https://fw.example.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            api_key: RwLock::new(None),
        }
    }

    /// The appliance base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── API key management ───────────────────────────────────────────

    /// Store an API key for subsequent requests.
    pub fn set_api_key(&self, key: SecretString) {
        *self
            .api_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// Whether an API key is currently available.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current_key(&self) -> Option<SecretString> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Exchange a username and password for an API key.
    ///
    /// The key is stored on the client and also returned so callers can
    /// cache it.
    pub async fn keygen(&self, username: &str, password: &SecretString) -> Result<SecretString, Error> {
        debug!(username, "generating API key");
        let params = [
            ("type", "keygen"),
            ("user", username),
            ("password", password.expose_secret()),
        ];
        let result = self
            .send(&params, false)
            .await
            .map_err(|e| match e {
                Error::Api { message, .. } => Error::Authentication { message },
                other => other,
            })?;

        let key = result
            .get_text(&["key"])
            .ok_or_else(|| Error::Authentication {
                message: "keygen response did not contain a key".into(),
            })?;
        let key = SecretString::from(key.to_owned());
        self.set_api_key(key.clone());
        Ok(key)
    }

    // ── Configuration actions ────────────────────────────────────────

    /// `type=config&action=get`: return the `<result>` holding the node at
    /// `xpath` from the candidate configuration.
    pub async fn get_config(&self, xpath: &str) -> Result<XmlNode, Error> {
        debug!(xpath, "config get");
        let result = self
            .send(
                &[("type", "config"), ("action", "get"), ("xpath", xpath)],
                true,
            )
            .await
            .map_err(|e| not_found_at(e, xpath))?;
        if result.children.is_empty() {
            return Err(Error::ObjectNotFound {
                xpath: xpath.to_owned(),
            });
        }
        Ok(result)
    }

    /// `type=config&action=set`: merge `element` under `xpath`.
    pub async fn set_config(&self, xpath: &str, element: &XmlNode) -> Result<(), Error> {
        debug!(xpath, "config set");
        let element = xml::to_string(element)?;
        self.send(
            &[
                ("type", "config"),
                ("action", "set"),
                ("xpath", xpath),
                ("element", element.as_str()),
            ],
            true,
        )
        .await?;
        Ok(())
    }

    /// `type=config&action=edit`: replace the node at `xpath` with `element`.
    pub async fn edit_config(&self, xpath: &str, element: &XmlNode) -> Result<(), Error> {
        debug!(xpath, "config edit");
        let element = xml::to_string(element)?;
        self.send(
            &[
                ("type", "config"),
                ("action", "edit"),
                ("xpath", xpath),
                ("element", element.as_str()),
            ],
            true,
        )
        .await?;
        Ok(())
    }

    /// `type=config&action=delete`: remove the node at `xpath`.
    pub async fn delete_config(&self, xpath: &str) -> Result<(), Error> {
        debug!(xpath, "config delete");
        self.send(
            &[("type", "config"), ("action", "delete"), ("xpath", xpath)],
            true,
        )
        .await
        .map_err(|e| not_found_at(e, xpath))?;
        Ok(())
    }

    /// `type=config&action=move`: reorder the entry at `xpath`.
    ///
    /// `dst` is required for `before`/`after` and ignored otherwise.
    pub async fn move_config(&self, xpath: &str, whence: MoveWhere, dst: Option<&str>) -> Result<(), Error> {
        debug!(xpath, whence = whence.as_str(), ?dst, "config move");
        let mut params = vec![
            ("type", "config"),
            ("action", "move"),
            ("xpath", xpath),
            ("where", whence.as_str()),
        ];
        if matches!(whence, MoveWhere::Before | MoveWhere::After) {
            let dst = dst.ok_or_else(|| {
                Error::InvalidRequest(format!("move {} requires a destination", whence.as_str()))
            })?;
            params.push(("dst", dst));
        }
        self.send(&params, true)
            .await
            .map_err(|e| not_found_at(e, xpath))?;
        Ok(())
    }

    /// `type=config&action=multi-config`: apply `ops` as one strict
    /// transaction. An empty batch is a no-op and sends nothing.
    pub async fn multi_config(&self, ops: &[MultiConfigOp]) -> Result<(), Error> {
        if ops.is_empty() {
            trace!("multi-config with no operations, skipping");
            return Ok(());
        }
        debug!(count = ops.len(), "config multi-config");

        let mut request = XmlNode::new("multi-configure-request");
        for (idx, op) in ops.iter().enumerate() {
            request.push(op.to_node(idx + 1));
        }
        let element = xml::to_string(&request)?;
        self.send(
            &[
                ("type", "config"),
                ("action", "multi-config"),
                ("strict-transactional", "yes"),
                ("element", element.as_str()),
            ],
            true,
        )
        .await?;
        Ok(())
    }

    /// `type=op`: run an operational command given as XML, returning the
    /// `<result>` element.
    pub async fn op(&self, cmd: &XmlNode) -> Result<XmlNode, Error> {
        let cmd = xml::to_string(cmd)?;
        debug!(cmd, "op command");
        self.send(&[("type", "op"), ("cmd", cmd.as_str())], true).await
    }

    // ── Request plumbing ─────────────────────────────────────────────

    fn api_url(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/"))?)
    }

    async fn send(&self, params: &[(&str, &str)], authenticated: bool) -> Result<XmlNode, Error> {
        let url = self.api_url()?;
        let mut builder = self.http.post(url).form(params);

        if authenticated {
            // Clone out of the lock so the guard is gone before awaiting.
            let key = self.current_key().ok_or(Error::MissingApiKey)?;
            builder = builder.header(API_KEY_HEADER, key.expose_secret());
        }

        let resp = builder.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(%status, len = body.len(), "XML API response");

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: envelope_message(&body)
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }

        if !status.is_success() {
            return Err(Error::Api {
                code: None,
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        parse_envelope(&body)
    }
}

/// Unwrap a `<response>` envelope, returning its `<result>` child.
pub(crate) fn parse_envelope(body: &str) -> Result<XmlNode, Error> {
    let root = xml::parse(body.as_bytes()).map_err(|e| Error::Malformed {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })?;

    if root.tag != "response" {
        return Err(Error::Malformed {
            message: format!("expected <response>, found <{}>", root.tag),
            body: body.to_owned(),
        });
    }

    let code = root.attr("code").and_then(|c| c.parse::<u16>().ok());

    match root.attr("status") {
        Some("success") => Ok(root
            .children
            .into_iter()
            .find(|c| c.tag == "result")
            .unwrap_or_else(|| XmlNode::new("result"))),
        Some("error") => {
            let message = collect_message(&root).unwrap_or_else(|| "unknown error".into());
            Err(match code {
                Some(CODE_UNAUTHORIZED | CODE_SESSION_TIMEOUT | 403) => {
                    Error::Authentication { message }
                }
                Some(CODE_OBJECT_NOT_PRESENT) => Error::ObjectNotFound { xpath: message },
                _ => Error::Api { code, message },
            })
        }
        other => Err(Error::Malformed {
            message: format!("unexpected response status {other:?}"),
            body: body.to_owned(),
        }),
    }
}

/// Replace the message placeholder of a not-found error with the xpath that
/// was addressed.
fn not_found_at(err: Error, xpath: &str) -> Error {
    match err {
        Error::ObjectNotFound { .. } => Error::ObjectNotFound {
            xpath: xpath.to_owned(),
        },
        other => other,
    }
}

fn envelope_message(body: &str) -> Option<String> {
    xml::parse(body.as_bytes())
        .ok()
        .and_then(|root| collect_message(&root))
}

/// Gather human-readable text from `<msg>` elements.
///
/// Errors arrive in several shapes: `<msg>text</msg>`,
/// `<msg><line>a</line><line>b</line></msg>`, `<result><msg>..</msg></result>`,
/// and for multi-config, nested `<response status="error">` elements.
fn collect_message(root: &XmlNode) -> Option<String> {
    let msg = root
        .get_child("msg")
        .or_else(|| root.get_child("result").and_then(|r| r.get_child("msg")));

    if let Some(msg) = msg {
        let mut lines = Vec::new();
        gather_text(msg, &mut lines);
        if !lines.is_empty() {
            return Some(lines.join(" "));
        }
    }

    root.children
        .iter()
        .filter(|c| c.tag == "response" && c.attr("status") == Some("error"))
        .find_map(collect_message)
}

fn gather_text(node: &XmlNode, out: &mut Vec<String>) {
    if let Some(text) = node.text.as_deref() {
        let text = text.trim();
        if !text.is_empty() {
            out.push(text.to_owned());
        }
    }
    for child in &node.children {
        gather_text(child, out);
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
