/// Replace `${NAME}` and `${NAME:-fallback}` placeholders with environment
/// values.
///
/// Unset variables without a fallback are left as-is so validation can
/// report them.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated, keep the remainder verbatim.
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match lookup(name).filter(|v| !v.is_empty()).or_else(|| fallback.map(String::from)) {
            Some(value) if !name.is_empty() => result.push_str(&value),
            _ => result.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

/// Returns the first `${...}` placeholder left in `value`, if any.
#[must_use]
pub fn unresolved_placeholder(value: &str) -> Option<&str> {
    let start = value.find("${")?;
    let end = value[start..].find('}')?;
    Some(&value[start..start + end + 1])
}
