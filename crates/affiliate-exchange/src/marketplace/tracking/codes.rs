use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const SHORT_CODE_LEN: usize = 8;
pub const DEFAULT_TRACKING_BASE_URL: &str = "https://track.affiliatexchange.com/go/";

/// Opaque 8 character `[A-Za-z0-9]` code embedded in tracking links.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortCode(String);

impl ShortCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed =
            raw.len() == SHORT_CODE_LEN && raw.bytes().all(|byte| byte.is_ascii_alphanumeric());
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `base_url` is expected to end with `/`; see `TrackingConfig`.
    pub fn link(&self, base_url: &str) -> String {
        format!("{base_url}{}", self.0)
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShortCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ShortCode::parse(&value).ok_or_else(|| format!("'{value}' is not a valid short code"))
    }
}

impl From<ShortCode> for String {
    fn from(value: ShortCode) -> Self {
        value.0
    }
}

/// Source of fresh tracking codes.
pub trait ShortCodeSource: Send + Sync {
    fn next_code(&self) -> ShortCode;
}

/// Eight independent uniform draws over the 62 symbol alphanumeric alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShortCodes;

impl ShortCodeSource for RandomShortCodes {
    fn next_code(&self) -> ShortCode {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_CODE_LEN)
            .map(char::from)
            .collect();
        ShortCode(code)
    }
}
