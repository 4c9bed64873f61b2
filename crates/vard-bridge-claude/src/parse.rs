//! Hook stdin parsing helpers.

pub(crate) fn parse_hook_stdin(stdin: &str) -> anyhow::Result<serde_json::Value> {
    let val: serde_json::Value = serde_json::from_str(stdin)?;
    Ok(val)
}

/// Get a string field, trying snake_case first then camelCase. The host
/// sends camelCase (`hookEventName`); internal tests use snake_case.
pub(crate) fn get_str(v: &serde_json::Value, snake_key: &str) -> String {
    if let Some(s) = v.get(snake_key).and_then(|x| x.as_str()) {
        return s.to_string();
    }
    let camel = snake_to_camel(snake_key);
    v.get(&camel)
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string()
}

/// Same snake/camel fallback for an object-valued field.
pub(crate) fn get_obj<'a>(
    v: &'a serde_json::Value,
    snake_key: &str,
) -> Option<&'a serde_json::Value> {
    if let Some(obj) = v.get(snake_key) {
        return Some(obj);
    }
    v.get(snake_to_camel(snake_key))
}

pub(crate) fn snake_to_camel(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
