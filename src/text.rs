//! Identifier-aware tokenisation shared by the hashing embedder and the
//! lexical index's symbol field.

/// Lowercased words plus the camelCase / snake_case parts of each word.
pub fn identifier_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if word.is_empty() {
            continue;
        }
        let parts = split_identifier(word);
        tokens.push(word.to_lowercase());
        if parts.len() > 1 {
            tokens.extend(parts.into_iter().map(|p| p.to_lowercase()));
        }
    }
    tokens
}

/// Split an identifier at underscores and lower-to-upper case changes.
pub fn split_identifier(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (i, c) in word.char_indices() {
        if c == '_' {
            if start < i {
                parts.push(&word[start..i]);
            }
            start = i + c.len_utf8();
        } else if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_numeric()) {
            if start < i {
                parts.push(&word[start..i]);
            }
            start = i;
        }
        prev = Some(c);
    }
    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}
