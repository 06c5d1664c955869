use std::path::Path;

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | '@' | ',' | '+' | '%')
}

/// Quote a word for a POSIX shell.
pub fn quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}
