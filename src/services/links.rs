//! Links to stored attachments.
//!
//! A link is `<base>/<workspace>/<collection>/<record_id>/<field>/<filename>`.
//! It is never stored on its own: it is rebuilt from the identifier and the
//! filename whenever it has to be matched against a record's link list, so
//! the base must resolve the same way for the upload and the delete.

use annex_storage::ResourceIdentifier;

use crate::{Error, Result};

/// Where the `<base>` part of a link comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkBase {
    /// Fixed base, e.g. the public URL of a reverse proxy.
    Proxy(String),
    /// The base URL of the request being served.
    Request,
}

impl LinkBase {
    /// Build from an optional configured proxy URL.
    ///
    /// The proxy URL must be an absolute URL.
    pub fn from_config(proxy_base_url: Option<&str>) -> Result<Self> {
        match proxy_base_url {
            Some(base) => {
                url::Url::parse(base).map_err(|e| {
                    Error::InvalidInput(format!("invalid proxy base URL {}: {}", base, e))
                })?;
                Ok(Self::Proxy(base.to_string()))
            }
            None => Ok(Self::Request),
        }
    }

    /// The base to use for a request whose own base URL is `request_base`.
    pub fn resolve<'a>(&'a self, request_base: &'a str) -> &'a str {
        match self {
            Self::Proxy(base) => base,
            Self::Request => request_base,
        }
    }
}

/// Link to `filename` stored under a complete identifier.
pub fn build_link(base: &str, id: &ResourceIdentifier, filename: &str) -> Result<String> {
    if !id.is_complete() {
        return Err(Error::InvalidIdentifier(format!(
            "link needs workspace, collection, record id and field: {}",
            id
        )));
    }

    let mut link = base.to_string();
    if !link.ends_with('/') {
        link.push('/');
    }

    let segments = id.segments();
    let encoded: Vec<String> = segments
        .iter()
        .copied()
        .chain(std::iter::once(filename))
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();
    link.push_str(&encoded.join("/"));

    Ok(link)
}
