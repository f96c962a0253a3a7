use std::collections::HashSet;

const TRUE_VALUES: &[&str] = &["1", "true", "yes", "on"];
const FALSE_VALUES: &[&str] = &["0", "false", "no", "off"];

/// Parses an environment-style boolean. Unrecognized or absent values keep `default`.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    let Some(raw) = value else {
        return default;
    };
    let normalized = raw.trim().to_lowercase();
    if TRUE_VALUES.contains(&normalized.as_str()) {
        return true;
    }
    if FALSE_VALUES.contains(&normalized.as_str()) {
        return false;
    }
    default
}

pub fn parse_csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

/// Lowercased tool allow-list from a comma-separated value. Empty means no filter.
pub fn parse_tool_filter(value: Option<&str>) -> HashSet<String> {
    parse_csv(value)
        .into_iter()
        .map(|name| name.to_lowercase())
        .collect()
}

pub fn parse_positive_u64(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|parsed| *parsed > 0)
}
