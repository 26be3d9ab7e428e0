use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const INDIVIDUAL_SUFFIX: &str = "@s.whatsapp.net";
pub const GROUP_SUFFIX: &str = "@g.us";
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Stable conversation identifier on the messaging network.
/// `<digits>@s.whatsapp.net` for individuals, `<id>@g.us` for groups.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Canonical individual jid for a phone number in any formatting.
    pub fn from_phone(phone: &str) -> Self {
        Self(format!("{}{}", digits_only(phone), INDIVIDUAL_SUFFIX))
    }

    /// Accepts either a full jid or a bare number missing its suffix.
    pub fn normalize(input: &str) -> Self {
        if input.contains('@') {
            Self::new(input)
        } else {
            Self(format!("{}{}", input, INDIVIDUAL_SUFFIX))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.ends_with(GROUP_SUFFIX)
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.0.contains(STATUS_BROADCAST)
    }

    /// The jid with its network suffix stripped.
    pub fn phone(&self) -> String {
        self.0
            .strip_suffix(INDIVIDUAL_SUFFIX)
            .or_else(|| self.0.strip_suffix(GROUP_SUFFIX))
            .unwrap_or(&self.0)
            .to_string()
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
