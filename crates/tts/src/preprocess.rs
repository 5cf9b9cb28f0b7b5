/// Strip Markdown markup the model emitted anyway, so it is not read aloud.
///
/// Headings, bullets, emphasis, strikethrough and code markers are dropped,
/// links keep only their text, and whitespace is collapsed.
pub fn preprocess_for_speech(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.trim_start().trim_start_matches('#');
        let line = strip_bullet(line.trim_start());
        out.push_str(&strip_links(line));
        out.push(' ');
    }
    let out: String = out
        .replace("__", "")
        .replace("~~", "")
        .chars()
        .filter(|c| !matches!(c, '*' | '`'))
        .collect();
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_bullet(line: &str) -> &str {
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest;
        }
    }
    line
}

/// `[text](url)` becomes `text`.
fn strip_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        if let Some(close) = after.find("](") {
            let target = &after[close + 2..];
            if let Some(end) = target.find(')') {
                out.push_str(&rest[..open]);
                out.push_str(&after[..close]);
                rest = &target[end + 1..];
                continue;
            }
        }
        out.push_str(&rest[..=open]);
        rest = after;
    }
    out.push_str(rest);
    out
}
