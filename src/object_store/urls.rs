//! Retrieval URLs for stored objects.
//!
//! An issued URL has the shape `{base}/o/{percent-encoded key}?alt=media`.
//! Decoding takes the segment after the last `/o/`, drops the query and
//! percent-decodes it back into the key, independent of the base.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{validate_key, ObjectStoreError};

/// Everything except unreserved characters is encoded, including `/`.
pub const KEY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_SET).to_string()
}

#[derive(Debug, Clone)]
pub struct ObjectUrls {
    base_url: String,
}

impl ObjectUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/o/{}?alt=media", self.base_url, encode_key(key))
    }

    pub fn key_for(&self, url: &str) -> Result<String, ObjectStoreError> {
        let invalid = || ObjectStoreError::InvalidKey(url.to_string());

        let parsed = url::Url::parse(url).map_err(|_| invalid())?;
        let (_, encoded) = parsed.path().rsplit_once("/o/").ok_or_else(invalid)?;
        let key = percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|_| invalid())?
            .into_owned();

        validate_key(&key)?;
        Ok(key)
    }
}
