//! Page mode, fixed once at launch.

use std::fmt;

use url::Url;

/// Query parameter that selects the mode.
const PAGE_TYPE_PARAM: &str = "PageType";

/// Device is the camera endpoint; Cloud is the viewing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Device,
    Cloud,
}

impl Mode {
    /// `Device` selects device mode; any other value, or none, is Cloud.
    pub fn from_page_type(value: Option<&str>) -> Self {
        match value {
            Some("Device") => Mode::Device,
            _ => Mode::Cloud,
        }
    }

    /// Device mode renders this client's own camera.
    pub fn renders_local_video(self) -> bool {
        self == Mode::Device
    }

    /// Cloud mode renders the remote participants' video.
    pub fn renders_remote_video(self) -> bool {
        self == Mode::Cloud
    }

    /// Whether the connect-by-destination controls exist in this mode.
    pub fn allows_destination(self) -> bool {
        self == Mode::Cloud
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Device => "Device",
            Mode::Cloud => "Cloud",
        }
    }
}

/// The `PageType` launch value, kept as given for the panel label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageType(Option<String>);

impl PageType {
    pub fn new(value: Option<String>) -> Self {
        Self(value)
    }

    /// Read `PageType` from a query string (leading `?` optional).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == PAGE_TYPE_PARAM)
                .map(|(_, v)| v.into_owned()),
        )
    }

    /// Read `PageType` from a full page URL.
    pub fn from_launch_url(launch: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(launch)?;
        Ok(Self::from_query(parsed.query().unwrap_or_default()))
    }

    pub fn mode(&self) -> Mode {
        Mode::from_page_type(self.0.as_deref())
    }

    /// The raw value; the mode name stands in when none was given.
    pub fn label(&self) -> &str {
        self.0.as_deref().unwrap_or(self.mode().as_str())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
