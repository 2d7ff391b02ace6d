//! Per-transport text shaping.

/// Cut `text` to at most `max_len` characters, appending `marker` when cut.
pub fn truncate_for_chat(text: &str, max_len: usize, marker: &str) -> String {
    match text.char_indices().nth(max_len) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + marker.len());
            out.push_str(&text[..cut]);
            out.push_str(marker);
            out
        }
        None => text.to_string(),
    }
}

/// Backslash-escape `@` and `§` unless already escaped; the console treats
/// both as selectors or formatting codes.
pub fn escape_for_game(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if matches!(c, '@' | '§') && previous != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

/// Non-empty lines of `text`, escaped for the game console.
pub fn game_lines(text: &str) -> Vec<String> {
    escape_for_game(text)
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `<label> text`, the shape of a mirrored chat line.
pub fn labelled(label: &str, text: &str) -> String {
    format!("<{label}> {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_for_chat("hello", 10, "..."), "hello");
        assert_eq!(truncate_for_chat("hello", 5, "..."), "hello");
        assert_eq!(truncate_for_chat("hello world", 5, "..."), "hello...");
        assert_eq!(truncate_for_chat("ééééé", 2, "…"), "éé…");
    }

    #[test]
    fn escapes_selectors_once() {
        assert_eq!(escape_for_game("hi @a"), "hi \\@a");
        assert_eq!(escape_for_game("§cred"), "\\§cred");
        assert_eq!(escape_for_game("already \\@p"), "already \\@p");
        assert_eq!(escape_for_game("plain"), "plain");
    }

    #[test]
    fn splits_and_drops_empty_lines() {
        assert_eq!(
            game_lines("one\n\ntwo @p\r\n"),
            vec!["one".to_string(), "two \\@p".to_string()]
        );
        assert!(game_lines("\n\n").is_empty());
    }
}
