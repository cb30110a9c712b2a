const MARKER: &str = "---";

/// Split a leading `---` delimited block off `text`.
///
/// Returns the block contents (without markers) and the remaining body. When
/// `text` does not open with a complete block the whole input is the body.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some((first_line, after_open)) = split_line(text) else {
        return (None, text);
    };
    if first_line.trim_end() != MARKER {
        return (None, text);
    }

    let mut cursor = after_open;
    let block_start = after_open;
    loop {
        let offset = block_start.len() - cursor.len();
        match split_line(cursor) {
            Some((line, rest)) => {
                if line.trim_end() == MARKER {
                    let block = block_start[..offset].trim_end_matches(['\n', '\r']);
                    return (Some(block), rest);
                }
                cursor = rest;
            }
            None => {
                if cursor.trim_end() == MARKER {
                    let block = block_start[..offset].trim_end_matches(['\n', '\r']);
                    return (Some(block), "");
                }
                return (None, text);
            }
        }
    }
}

/// Split at the first `\n`, returning `None` when the input has no newline.
fn split_line(text: &str) -> Option<(&str, &str)> {
    text.split_once('\n')
}
