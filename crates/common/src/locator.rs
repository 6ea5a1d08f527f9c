//! Deferred element locators
//!
//! A [`Locator`] is never checked against a DOM when a scenario is built; the
//! target page only exists at run time. Locators can be written in scenario
//! files either as a mapping or as a Playwright-style shorthand string:
//!
//! ```text
//! css=button.primary          xpath=/html/body/div[2]/form/button
//! text=No Alerts Found        testid=login-submit
//! label=Email address         placeholder=Search contractors
//! role=button[name=Sign in]   #email            (bare string = CSS)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Strategy used to find elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector
    Css(String),
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),
    /// Element whose visible text contains the value
    Text(String),
    /// `data-testid` attribute
    TestId(String),
    /// ARIA role, optionally filtered by accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Form control by associated label text
    Label(String),
    /// Input or textarea by placeholder
    Placeholder(String),
}

impl Selector {
    /// Short tag used by the in-page resolver
    pub fn kind(&self) -> &'static str {
        match self {
            Selector::Css(_) => "css",
            Selector::XPath(_) => "xpath",
            Selector::Text(_) => "text",
            Selector::TestId(_) => "test_id",
            Selector::Role { .. } => "role",
            Selector::Label(_) => "label",
            Selector::Placeholder(_) => "placeholder",
        }
    }

    /// Primary selector value
    pub fn value(&self) -> &str {
        match self {
            Selector::Css(v)
            | Selector::XPath(v)
            | Selector::Text(v)
            | Selector::TestId(v)
            | Selector::Label(v)
            | Selector::Placeholder(v) => v,
            Selector::Role { role, .. } => role,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Role { role, name: Some(name) } => write!(f, "role={}[name={}]", role, name),
            Selector::Role { role, name: None } => write!(f, "role={}", role),
            Selector::TestId(v) => write!(f, "testid={}", v),
            other => write!(f, "{}={}", other.kind(), other.value()),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(Error::InvalidLocator(raw.to_string()));
        }

        let selector = if let Some(v) = s.strip_prefix("css=") {
            Selector::Css(v.to_string())
        } else if let Some(v) = s.strip_prefix("xpath=") {
            Selector::XPath(v.to_string())
        } else if let Some(v) = s.strip_prefix("text=") {
            Selector::Text(v.to_string())
        } else if let Some(v) = s.strip_prefix("testid=") {
            Selector::TestId(v.to_string())
        } else if let Some(v) = s.strip_prefix("label=") {
            Selector::Label(v.to_string())
        } else if let Some(v) = s.strip_prefix("placeholder=") {
            Selector::Placeholder(v.to_string())
        } else if let Some(v) = s.strip_prefix("role=") {
            parse_role(v).ok_or_else(|| Error::InvalidLocator(raw.to_string()))?
        } else if s.starts_with('/') || s.starts_with("(/") {
            Selector::XPath(s.to_string())
        } else {
            Selector::Css(s.to_string())
        };

        if selector.value().trim().is_empty() {
            return Err(Error::InvalidLocator(raw.to_string()));
        }
        Ok(selector)
    }
}

/// Parse `button` or `button[name=Sign in]`
fn parse_role(spec: &str) -> Option<Selector> {
    match spec.find('[') {
        None => Some(Selector::Role {
            role: spec.trim().to_string(),
            name: None,
        }),
        Some(open) => {
            let rest = spec[open + 1..].strip_suffix(']')?;
            let name = rest.strip_prefix("name=")?;
            let name = name.trim_matches(|c| c == '"' || c == '\'');
            Some(Selector::Role {
                role: spec[..open].trim().to_string(),
                name: Some(name.to_string()),
            })
        }
    }
}

/// Which frames a locator is allowed to search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum FrameScope {
    /// Top-level document only
    #[default]
    Main,
    /// Any nested frame, optionally narrowed by URL fragment or frame name
    Nested {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url_contains: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl FrameScope {
    pub fn any_nested() -> Self {
        FrameScope::Nested {
            url_contains: None,
            name: None,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, FrameScope::Nested { .. })
    }

    /// Whether a frame with the given url/name satisfies the scope filter
    pub fn admits(&self, url: &str, name: Option<&str>) -> bool {
        match self {
            FrameScope::Main => false,
            FrameScope::Nested {
                url_contains,
                name: wanted,
            } => {
                let url_ok = url_contains
                    .as_deref()
                    .map(|frag| url.contains(frag))
                    .unwrap_or(true);
                let name_ok = match wanted.as_deref() {
                    Some(w) => name == Some(w),
                    None => true,
                };
                url_ok && name_ok
            }
        }
    }
}

/// A selector plus ordinal and frame scope, resolved against the live page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LocatorRepr")]
pub struct Locator {
    #[serde(flatten)]
    pub selector: Selector,
    #[serde(default)]
    pub nth: usize,
    #[serde(default)]
    pub frame: FrameScope,
}

impl Locator {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            nth: 0,
            frame: FrameScope::Main,
        }
    }

    pub fn css(s: impl Into<String>) -> Self {
        Self::new(Selector::Css(s.into()))
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Self::new(Selector::XPath(s.into()))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(Selector::Text(s.into()))
    }

    pub fn test_id(s: impl Into<String>) -> Self {
        Self::new(Selector::TestId(s.into()))
    }

    pub fn label(s: impl Into<String>) -> Self {
        Self::new(Selector::Label(s.into()))
    }

    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::new(Selector::Role {
            role: role.into(),
            name: name.map(String::from),
        })
    }

    pub fn nth(mut self, nth: usize) -> Self {
        self.nth = nth;
        self
    }

    pub fn in_frame(mut self, scope: FrameScope) -> Self {
        self.frame = scope;
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        if self.nth > 0 {
            write!(f, " >> nth={}", self.nth)?;
        }
        if self.frame.is_nested() {
            write!(f, " (in frame)")?;
        }
        Ok(())
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Locator::new(s.parse()?))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Short(String),
    Full {
        #[serde(flatten)]
        selector: Selector,
        #[serde(default)]
        nth: usize,
        #[serde(default)]
        frame: FrameScope,
    },
}

impl TryFrom<LocatorRepr> for Locator {
    type Error = Error;

    fn try_from(repr: LocatorRepr) -> Result<Self, Self::Error> {
        match repr {
            LocatorRepr::Short(s) => s.parse(),
            LocatorRepr::Full {
                selector,
                nth,
                frame,
            } => {
                if selector.value().trim().is_empty() {
                    return Err(Error::InvalidLocator(selector.to_string()));
                }
                Ok(Locator {
                    selector,
                    nth,
                    frame,
                })
            }
        }
    }
}
