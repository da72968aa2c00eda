//! `${name}` expansion for header values and host overrides.

/// Expand every `${name}` in `template` through `lookup`.
///
/// Names are trimmed before lookup. Unknown names expand to nothing and an
/// unterminated `${` is copied through as is.
pub fn expand<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                if let Some(value) = lookup(after[..end].trim()) {
                    out.push_str(&value);
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
