//! Query-string expansion for the relay: compact `label_i`/`value_i` pairs are
//! rewritten into repeated `key=value` parameters, and the mandatory
//! `redirectUrl` target is pulled out of the query.

use thiserror::Error;
use url::Url;

pub const REDIRECT_URL_PARAM: &str = "redirectUrl";
pub const DEBUG_PARAM: &str = "debug";

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("malformed url: {0}")]
    MalformedUrl(#[from] url::ParseError),
    #[error("'redirectUrl' param is not found in url. usage: {usage}")]
    MissingRedirectUrl { usage: String },
}

/// An ordered multi-map view of a query string. Names may repeat; pair order is
/// the order they appeared in (or were appended to) the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pairs: Vec<(String, String)>,
}

impl ParsedQuery {
    pub fn from_query(raw: &str) -> Self {
        let pairs = url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect();
        Self { pairs }
    }

    /// First value under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.pairs.push((name.to_string(), value.to_string()));
    }

    /// Removes every pair under `name`, returning the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let first = self.get(name).map(str::to_owned);
        self.pairs.retain(|(k, _)| k != name);
        first
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

/// Result of [`split_param_list`]. `Empty` marks blank input and is distinct
/// from `Items(vec![])` ("no surviving tokens"); downstream both append nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamList {
    Empty,
    Items(Vec<String>),
}

/// Splits a filter value like `"a, b, c, d, and e"` into `["a","b","c","d","e"]`.
///
/// Every literal occurrence of the substring `"and"` is removed before the
/// comma split, so `"a,b,andc"` also becomes `["a","b","c"]` and a token such
/// as `"sandbox"` is corrupted to `"sbox"`. That substring strip is legacy
/// behavior callers depend on; do not narrow it to word boundaries.
pub fn split_param_list(raw: Option<&str>) -> Option<ParamList> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return Some(ParamList::Empty);
    }
    let items = raw
        .replace("and", "")
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect();
    Some(ParamList::Items(items))
}

/// Parses a request URL and rewrites its query in place: the `debug` flag is
/// consumed at construction, indexed pairs are expanded, and the redirect
/// target is extracted on demand.
pub struct ParamExpander {
    url: Url,
    query: ParsedQuery,
    debug: bool,
}

impl ParamExpander {
    pub fn parse(raw: &str) -> Result<Self, ExpandError> {
        let url = Url::parse(raw)?;
        let mut query = ParsedQuery::from_query(url.query().unwrap_or(""));
        let debug = query
            .remove(DEBUG_PARAM)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let mut expander = Self { url, query, debug };
        expander.expand_indexed_pairs();
        Ok(expander)
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn query(&self) -> &ParsedQuery {
        &self.query
    }

    /// Consumes `label_i`/`value_i` pairs for i = 0, 1, 2, … and appends the
    /// split values under the label name. Scanning stops at the first index
    /// where `label_i` is missing or `value_i` is missing/empty; later indices
    /// are left untouched.
    fn expand_indexed_pairs(&mut self) {
        for i in 0.. {
            let label_key = format!("label_{i}");
            let value_key = format!("value_{i}");
            let present = self.query.contains(&label_key)
                && self.query.get(&value_key).is_some_and(|v| !v.is_empty());
            if !present {
                break;
            }

            let label = self.query.remove(&label_key).unwrap_or_default();
            let value = self.query.remove(&value_key);
            if let Some(ParamList::Items(items)) = split_param_list(value.as_deref()) {
                for item in &items {
                    self.query.append(&label, item);
                }
            }
        }
    }

    /// Removes `redirectUrl` from the query and parses it as the target.
    pub fn extract_redirect_url(&mut self) -> Result<Url, ExpandError> {
        match self.query.remove(REDIRECT_URL_PARAM) {
            Some(v) if !v.is_empty() => Ok(Url::parse(&v)?),
            _ => Err(ExpandError::MissingRedirectUrl {
                usage: self.usage(),
            }),
        }
    }

    pub fn usage(&self) -> String {
        let mut indexed = String::new();
        for i in 0..2 {
            indexed.push_str(&format!(
                "&label_{i}={{after-url-param-name}}&value_{i}={{filter-values}}"
            ));
        }
        indexed.push_str("&...");
        format!(
            "{}{}?redirectUrl={{your-redirect-url}}&debug={{true-or-false}}{indexed}",
            self.url.origin().ascii_serialization(),
            self.url.path(),
        )
    }

    /// Sample link shown on the debug page, pointing back at this service.
    pub fn test_link(&self) -> String {
        format!(
            "{}{}?redirectUrl=https://google.com&debug=true\
             &label_0=lb0&value_0=a,b,andc\
             &label_1=lb1&value_1=aa,bb,andcc\
             &label_2=lb2&value_2=aa,bb,andcc\
             &hoge=hoge",
            self.url.origin().ascii_serialization(),
            self.url.path(),
        )
    }

    /// Final destination: the target's origin and path with the expanded query
    /// serialized as repeated `key=value` pairs. The target's own query and
    /// fragment are discarded.
    pub fn build_final_url(&self, redirect: &Url) -> String {
        let base = format!(
            "{}{}",
            redirect.origin().ascii_serialization(),
            redirect.path()
        );
        if self.query.is_empty() {
            base
        } else {
            format!("{base}?{}", self.query.to_query_string())
        }
    }
}

/// Terminal value of the pure pipeline, handed to a [`RelayPorts`] impl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Navigate { url: String },
    Debug { final_url: String, test_link: String },
}

/// Boundary between the transform and the environment. The web layer
/// implements this over HTTP responses; tests inject a recording impl.
pub trait RelayPorts {
    fn navigate(&mut self, url: &str);
    fn render_debug(&mut self, final_url: &str, test_link: &str);
    fn render_error(&mut self, message: &str);
}

/// Parse → expand → extract redirect → build. Pure; no side effects.
pub fn process(raw_url: &str) -> Result<Outcome, ExpandError> {
    let mut expander = ParamExpander::parse(raw_url)?;
    let redirect = expander.extract_redirect_url()?;
    let final_url = expander.build_final_url(&redirect);
    if expander.is_debug() {
        Ok(Outcome::Debug {
            final_url,
            test_link: expander.test_link(),
        })
    } else {
        Ok(Outcome::Navigate { url: final_url })
    }
}

/// Runs the pipeline and dispatches the outcome to the injected ports.
pub fn run(raw_url: &str, ports: &mut dyn RelayPorts) {
    match process(raw_url) {
        Ok(Outcome::Navigate { url }) => ports.navigate(&url),
        Ok(Outcome::Debug {
            final_url,
            test_link,
        }) => ports.render_debug(&final_url, &test_link),
        Err(e) => ports.render_error(&e.to_string()),
    }
}
