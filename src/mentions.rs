/// Extract `@name` mention tokens from a message body.
///
/// A mention starts at an `@` that begins the body or follows a
/// non-identifier character, and runs over `[A-Za-z0-9_-]`. Embedded `@`s
/// (email addresses and the like) are not mentions. Results are deduplicated
/// in first-appearance order.
pub fn parse_mentions(body: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let chars: Vec<char> = body.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '@' && (i == 0 || !is_ident_char(chars[i - 1])) {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_ident_char(chars[end]) {
                end += 1;
            }
            if end > start {
                let name: String = chars[start..end].iter().collect();
                if !out.contains(&name) {
                    out.push(name);
                }
            }
            i = end;
        } else {
            i += 1;
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
