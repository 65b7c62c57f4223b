//! Per-stack inputs and value parsers.
//!
//! Every input is a newline-separated list. It either has a single line,
//! which applies to every stack, or exactly one line per stack.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::core::{Parameter, Tag};
use crate::errors::ConfigError;

/// One input's values, resolved per stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet {
    input: String,
    lines: Vec<String>,
}

impl InputSet {
    /// Splits `raw` into lines for `stack_count` stacks.
    ///
    /// A missing input counts as a single empty line. Lines are split with
    /// [`split_lines`], so positions line up with stack names.
    pub fn from_lines(
        input: impl Into<String>,
        raw: Option<&str>,
        stack_count: usize,
    ) -> Result<Self, ConfigError> {
        let input = input.into();
        let lines = raw.map_or_else(|| vec![String::new()], split_lines);

        if lines.len() != 1 && lines.len() != stack_count {
            return Err(ConfigError::LineCountMismatch { input });
        }
        Ok(Self { input, lines })
    }

    /// Returns the input name.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns true if one line applies to every stack.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.lines.len() == 1
    }

    /// Returns the line for the stack at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> &str {
        let line = if self.is_broadcast() {
            self.lines.first()
        } else {
            self.lines.get(index)
        };
        line.map_or("", String::as_str)
    }
}

/// Splits a multi-line input into lines.
///
/// Surrounding whitespace of the whole value is dropped first, so a trailing
/// newline does not add a line. Blank lines inside the value are kept.
#[must_use]
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.trim()
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Raw named inputs, as handed over by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInputs {
    values: BTreeMap<String, String>,
}

impl RawInputs {
    /// Creates an empty set of inputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an input.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Returns an input, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns a non-empty input, or [`ConfigError::MissingInput`].
    pub fn required(&self, name: &str) -> Result<&str, ConfigError> {
        match self.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingInput {
                input: name.to_string(),
            }),
        }
    }

    /// Resolves an input per stack.
    pub fn per_stack(&self, name: &str, stack_count: usize) -> Result<InputSet, ConfigError> {
        InputSet::from_lines(name, self.get(name), stack_count)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawInputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Returns true if `value` is an https URL.
#[must_use]
pub fn is_url(value: &str) -> bool {
    value
        .strip_prefix("https://")
        .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
}

/// Parses parameter overrides.
///
/// Accepts `Key=Value` pairs separated by commas; repeated keys have their
/// values joined with commas. A `file://` URL is read as a JSON array of
/// `{"ParameterKey", "ParameterValue"}` objects.
pub fn parse_parameters(value: &str) -> Result<Vec<Parameter>, ConfigError> {
    if let Some(path) = value.strip_prefix("file://") {
        return read_parameter_file(Path::new(path));
    }

    let mut order: Vec<String> = Vec::new();
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    for pair in value.split(',') {
        let pair = pair.trim();
        let (key, val) = pair.split_once('=').unwrap_or((pair, ""));
        match values.get_mut(key) {
            Some(existing) => {
                existing.push(',');
                existing.push_str(val);
            }
            None => {
                order.push(key.to_string());
                values.insert(key.to_string(), val.to_string());
            }
        }
    }

    Ok(order
        .into_iter()
        .map(|key| {
            let value = values.remove(&key).unwrap_or_default();
            Parameter::new(key, value)
        })
        .collect())
}

fn read_parameter_file(path: &Path) -> Result<Vec<Parameter>, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::read(path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&raw)
        .map_err(|e| ConfigError::read(path.display().to_string(), e.to_string()))
}

/// Parses tags from a JSON array of `{"Key", "Value"}` objects.
///
/// Returns `None` for empty or malformed input.
#[must_use]
pub fn parse_tags(value: &str) -> Option<Vec<Tag>> {
    serde_json::from_str(value).ok()
}

/// Parses a comma-separated list of ARNs. Empty input yields `None`.
#[must_use]
pub fn parse_arns(value: &str) -> Option<Vec<String>> {
    if value.is_empty() {
        None
    } else {
        Some(value.split(',').map(str::to_string).collect())
    }
}

/// Returns `None` for an empty string.
#[must_use]
pub fn parse_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parses a numeric flag: any non-zero number is true, everything else
/// (including empty input and words like `true`) is false.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .is_ok_and(|n| n != 0.0 && !n.is_nan())
}

/// Parses the leading integer of `value`. Zero or no digits yield `None`.
#[must_use]
pub fn parse_number(value: &str) -> Option<u32> {
    static LEADING: OnceLock<Option<Regex>> = OnceLock::new();
    let re = LEADING.get_or_init(|| Regex::new(r"^\s*\+?(\d+)").ok()).as_ref()?;

    re.captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Parses a comma-separated capability list, trimming each entry.
#[must_use]
pub fn parse_capabilities(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_single_line_is_broadcast() {
        let set = InputSet::from_lines("capabilities", Some("CAPABILITY_IAM"), 3).unwrap();
        assert!(set.is_broadcast());
        assert_eq!(set.get(2), "CAPABILITY_IAM");
    }

    #[test]
    fn test_one_line_per_stack() {
        let set = InputSet::from_lines("role-arn", Some("arn:a\n\narn:c"), 3).unwrap();
        assert_eq!(set.get(0), "arn:a");
        assert_eq!(set.get(1), "");
        assert_eq!(set.get(2), "arn:c");
    }

    #[test]
    fn test_trailing_newline_does_not_add_a_line() {
        assert_eq!(split_lines("api\nweb\n"), vec!["api", "web"]);
        assert_eq!(split_lines("api\r\n\nweb"), vec!["api", "", "web"]);

        let set = InputSet::from_lines("role-arn", Some("arn:a\narn:b\n"), 2).unwrap();
        assert!(!set.is_broadcast());
        assert_eq!(set.get(1), "arn:b");
    }

    #[test]
    fn test_missing_input_is_one_empty_line() {
        let set = InputSet::from_lines("tags", None, 4).unwrap();
        assert_eq!(set.get(3), "");
    }

    #[test]
    fn test_line_count_mismatch() {
        let err = InputSet::from_lines("parameter-overrides", Some("a=1\nb=2"), 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "number input parameter-overrides lines must match name lines or must be a single line"
        );
    }

    #[test]
    fn test_required_input() {
        let inputs = RawInputs::new().with("name", "  ");
        assert!(matches!(
            inputs.required("name"),
            Err(ConfigError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_parse_parameters_joins_repeated_keys() {
        let params = parse_parameters("Env=prod, Subnets=a,Subnets=b,Flag").unwrap();
        assert_eq!(
            params,
            vec![
                Parameter::new("Env", "prod"),
                Parameter::new("Subnets", "a,b"),
                Parameter::new("Flag", ""),
            ]
        );
    }

    #[test]
    fn test_parse_parameters_keeps_equals_in_value() {
        let params = parse_parameters("Token=abc==").unwrap();
        assert_eq!(params, vec![Parameter::new("Token", "abc==")]);
    }

    #[test]
    fn test_parse_parameters_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"ParameterKey": "Env", "ParameterValue": "dev"}}]"#
        )
        .unwrap();
        let url = format!("file://{}", file.path().display());

        let params = parse_parameters(&url).unwrap();
        assert_eq!(params, vec![Parameter::new("Env", "dev")]);
    }

    #[test]
    fn test_parse_parameters_missing_file() {
        let err = parse_parameters("file:///does/not/exist.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(r#"[{"Key": "team", "Value": "infra"}]"#).unwrap();
        assert_eq!(tags, vec![Tag::new("team", "infra")]);
        assert!(parse_tags("").is_none());
        assert!(parse_tags("team=infra").is_none());
    }

    #[test]
    fn test_parse_arns() {
        assert_eq!(
            parse_arns("arn:sns:a,arn:sns:b"),
            Some(vec!["arn:sns:a".to_string(), "arn:sns:b".to_string()])
        );
        assert_eq!(parse_arns(""), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" 2 "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("true"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("30"), Some(30));
        assert_eq!(parse_number("15min"), Some(15));
        assert_eq!(parse_number("0"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("soon"), None);
    }

    #[test]
    fn test_parse_capabilities() {
        assert_eq!(
            parse_capabilities("CAPABILITY_IAM, CAPABILITY_AUTO_EXPAND,"),
            vec!["CAPABILITY_IAM", "CAPABILITY_AUTO_EXPAND"]
        );
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://bucket.s3.amazonaws.com/app.template.json"));
        assert!(!is_url("http://bucket.s3.amazonaws.com/app.template.json"));
        assert!(!is_url("{\"Resources\": {}}"));
        assert!(!is_url("https://"));
    }
}
