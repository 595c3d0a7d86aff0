use std::fmt;

pub const DEFAULT_PRODUCT_NAME: &str = "Apache AsterixDB";

/// Server identification parsed from the `Server` response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVersion {
    product_name: String,
    product_version: String,
    major: u32,
    minor: u32,
}

fn leading_number(text: &str) -> Option<(&str, &str)> {
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    (end > 0).then(|| text.split_at(end))
}

impl ProductVersion {
    pub fn new(product_name: Option<String>, product_version: Option<String>, major: u32, minor: u32) -> Self {
        Self {
            product_name: product_name.unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()),
            product_version: product_version.unwrap_or_else(|| format!("{}.{}", major, minor)),
            major,
            minor,
        }
    }

    /// Parse `name[/major[.minor]...]`. Anything unparsable falls back to defaults
    /// and numbers that overflow read as 0.
    pub fn parse(server: Option<&str>) -> Self {
        let Some(server) = server.filter(|s| !s.is_empty() && !s.starts_with('/')) else {
            return Self::new(None, None, 0, 0);
        };
        let Some((name, version)) = server.split_once('/') else {
            return Self::new(Some(server.to_string()), None, 0, 0);
        };

        let mut major = 0;
        let mut minor = 0;
        if let Some((major_text, rest)) = leading_number(version) {
            major = major_text.parse().unwrap_or(0);
            if let Some((minor_text, _)) = rest.strip_prefix('.').and_then(leading_number) {
                minor = minor_text.parse().unwrap_or(0);
            }
        }
        Self::new(Some(name.to_string()), Some(version.to_string()), major, minor)
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn product_version(&self) -> &str {
        &self.product_version
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.product_name, self.product_version)
    }
}
