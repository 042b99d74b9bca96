//! Best-effort `.env` loading (§4.5 ambient addition).
//!
//! A missing or malformed file is never fatal — it just means the
//! Loader's environment-variable instantiation strategy has less to work
//! with. Plain `KEY=VALUE` lines only; no quoting, escaping, or
//! multi-line values, since the adapters this feeds only ever declare
//! simple scalar constructor parameters.

use std::path::Path;

/// Load `<project_root>/.env` into the process environment, one
/// `KEY=VALUE` per line. Blank lines and lines starting with `#` are
/// skipped. Malformed lines are logged at debug and skipped; a missing
/// file is logged at debug and otherwise ignored.
pub fn load(project_root: &Path) {
    let path = project_root.join(".env");
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            log::debug!("no .env loaded from {}: {e}", path.display());
            return;
        }
    };

    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some((key, value)) => std::env::set_var(key, value),
            None => log::debug!("skipping malformed .env line {}", line_number + 1),
        }
    }
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_key_value() {
        assert_eq!(parse_line("API_KEY=secret"), Some(("API_KEY", "secret")));
    }

    #[test]
    fn trims_surrounding_quotes_and_whitespace() {
        assert_eq!(parse_line(" BASE_URL = \"https://example.com\" "), Some(("BASE_URL", "https://example.com")));
    }

    #[test]
    fn rejects_a_line_with_no_equals_sign() {
        assert_eq!(parse_line("not-a-valid-line"), None);
    }

    #[test]
    fn missing_file_does_not_panic() {
        load(Path::new("/nonexistent/path/for/test"));
    }
}
