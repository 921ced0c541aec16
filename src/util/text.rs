use std::borrow::Cow;

fn is_stripped_control(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences from text.
///
/// Feed titles, summaries and authors are remote input; printing them raw
/// would let a feed move the cursor or retitle the terminal.
///
/// Strips ASCII controls other than tab, newline and carriage return, CSI
/// sequences (`ESC [` up to a final byte in `@`..=`~`), OSC sequences
/// (`ESC ]` up to BEL or `ESC \`), and any other bare ESC.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Name of the file a subscription's feed content is stored in.
///
/// The title is lower-cased with every character outside `[a-z0-9]`
/// replaced by `-`, then suffixed with the first group of the id so two
/// feeds with the same title never collide.
pub fn content_file_name(title: &str, id: &str) -> String {
    let normalized: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let short_id = id.split('-').next().unwrap_or(id);
    format!("{normalized}_{short_id}.xml")
}
