use crate::{AmqError, AmqResult};
use url::Url;

/// A single transport URI: `scheme://host:port?option=value&...`.
///
/// Options keep their order; unknown options are carried along and ignored
/// by the layers that do not understand them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerUri {
    scheme: String,
    host: String,
    port: Option<u16>,
    options: Vec<(String, String)>,
}

impl BrokerUri {
    pub fn parse(input: &str) -> AmqResult<Self> {
        let url = Url::parse(input)?;
        let host = url
            .host_str()
            .ok_or_else(|| AmqError::UriDetailed(format!("no host in {input:?}")))?
            .to_string();
        let options = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
            options,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `host:port` as a connectable address.
    pub fn addr(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    pub fn bool_option(&self, key: &str, default: bool) -> bool {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn i32_option(&self, key: &str, default: i32) -> i32 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn i64_option(&self, key: &str, default: i64) -> i64 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn f64_option(&self, key: &str, default: f64) -> f64 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// The URI without its query part; used to compare pool members.
    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.addr())
    }
}

impl std::fmt::Display for BrokerUri {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.addr())?;
        let mut sep = std::iter::repeat(())
            .enumerate()
            .map(|(i, ())| if i == 0 { "?" } else { "&" });
        for (k, v) in &self.options {
            write!(f, "{}{k}={v}", sep.next().unwrap())?;
        }
        Ok(())
    }
}

/// A composite URI: `failover://(uri,uri,...)?outer=...`.
///
/// Inner options belong to the child transports, outer options to the
/// composing layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeUri {
    pub scheme: String,
    pub components: Vec<BrokerUri>,
    pub options: Vec<(String, String)>,
}

impl CompositeUri {
    pub fn parse(input: &str) -> AmqResult<Self> {
        let (scheme, rest) = input
            .split_once(':')
            .ok_or_else(|| AmqError::UriDetailed(format!("no scheme in {input:?}")))?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        let (inner, outer) = if let Some(rest) = rest.strip_prefix('(') {
            let close = find_matching_paren(rest)
                .ok_or_else(|| AmqError::UriDetailed(format!("unbalanced parens in {input:?}")))?;
            (&rest[..close], &rest[close + 1..])
        } else {
            // without parens the whole remainder is the component list and
            // there are no outer options
            (rest, "")
        };

        let components = split_components(inner)
            .into_iter()
            .map(|u| BrokerUri::parse(u))
            .collect::<AmqResult<Vec<_>>>()?;
        if components.is_empty() {
            return Err(AmqError::UriDetailed(format!(
                "no component URIs in {input:?}"
            )));
        }

        let options = match outer.strip_prefix('?') {
            Some(query) => query
                .split('&')
                .filter(|p| !p.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (pair.to_string(), String::new()),
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            components,
            options,
        })
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    pub fn bool_option(&self, key: &str, default: bool) -> bool {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn i32_option(&self, key: &str, default: i32) -> i32 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn i64_option(&self, key: &str, default: i64) -> i64 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn f64_option(&self, key: &str, default: f64) -> f64 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

// Index of the parenthesis closing the one already consumed, respecting
// nesting.
fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0_usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

// Split on commas that are not inside nested parens.
fn split_components(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0_usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                if !s[start..i].trim().is_empty() {
                    parts.push(s[start..i].trim());
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if !s[start..].trim().is_empty() {
        parts.push(s[start..].trim());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_uri() {
        let uri = BrokerUri::parse("tcp://broker.example.com:61616?soTimeout=500").unwrap();
        assert_eq!(uri.scheme(), "tcp");
        assert_eq!(uri.host(), "broker.example.com");
        assert_eq!(uri.port(), Some(61616));
        assert_eq!(uri.i32_option("soTimeout", 0), 500);
        assert_eq!(uri.i32_option("unknown", 7), 7);
        assert_eq!(
            uri.to_string(),
            "tcp://broker.example.com:61616?soTimeout=500"
        );
    }

    #[test]
    fn composite_uri_with_outer_options() {
        let uri = CompositeUri::parse(
            "failover://(mock://a:1?failOnCreate=true,mock://b:2)?randomize=false&maxReconnectAttempts=3",
        )
        .unwrap();
        assert_eq!(uri.scheme, "failover");
        assert_eq!(uri.components.len(), 2);
        assert_eq!(uri.components[0].host(), "a");
        assert!(uri.components[0].bool_option("failOnCreate", false));
        assert_eq!(uri.components[1].addr(), "b:2");
        assert!(!uri.bool_option("randomize", true));
        assert_eq!(uri.i32_option("maxReconnectAttempts", -1), 3);
    }

    #[test]
    fn composite_uri_without_parens() {
        let uri = CompositeUri::parse("failover:tcp://a:61616,tcp://b:61616").unwrap();
        assert_eq!(uri.components.len(), 2);
        assert!(uri.options.is_empty());
    }

    #[test]
    fn host_without_port() {
        let uri = BrokerUri::parse("mock://primary").unwrap();
        assert_eq!(uri.addr(), "primary");
        assert_eq!(uri.port(), None);
    }

    #[test]
    fn unbalanced_composite_is_rejected() {
        assert!(CompositeUri::parse("failover://(tcp://a:1").is_err());
        assert!(CompositeUri::parse("failover://()").is_err());
    }
}
