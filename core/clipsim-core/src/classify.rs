//! Content classification and preview trimming.
//!
//! Classification never allocates. `trim` allocates at most once, and not at
//! all when the preview would equal the content.

/// Largest payload accepted into the history.
pub const MAX_ENTRY_LENGTH: usize = 32768;
/// Byte cap applied to the source before a preview is derived.
pub const PREVIEW_CAP: usize = 255;

const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
    /// Selection data that is neither text nor an image (e.g. a bare TARGETS list).
    Other,
    Large,
    /// Whitespace-only or single-character payloads.
    Error,
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n')
}

pub fn classify(content: &[u8]) -> ContentKind {
    if content.len() > MAX_ENTRY_LENGTH {
        return ContentKind::Large;
    }

    // A NUL ends the buffer the same way the end of the slice does.
    match content.iter().copied().find(|byte| !is_space(*byte)) {
        None | Some(0) => return ContentKind::Error,
        Some(_) => {}
    }

    if content.len() <= 2 {
        let printable = (0x20..=0x7E).contains(&content[0]);
        if printable && (content.len() == 1 || content[1] == b'\n') {
            return ContentKind::Error;
        }
    }

    if content.len() >= PNG_MAGIC.len() && content[..PNG_MAGIC.len()] == PNG_MAGIC {
        return ContentKind::Image;
    }

    ContentKind::Text
}

/// Drops trailing line feeds in place.
pub fn strip_line_feeds(content: &mut Vec<u8>) {
    while content.last() == Some(&b'\n') {
        content.pop();
    }
}

/// Derives the listing preview of `content`.
///
/// Returns `None` when the preview is byte-identical to the content, in which
/// case callers reuse the content itself.
pub fn trim(content: &[u8]) -> Option<Vec<u8>> {
    let capped = &content[..content.len().min(PREVIEW_CAP)];

    let start = capped
        .iter()
        .position(|byte| !is_space(*byte))
        .unwrap_or(capped.len());
    let end = capped
        .iter()
        .rposition(|byte| !is_space(*byte))
        .map_or(start, |index| index + 1);
    let body = &capped[start..end];

    let mut preview = Vec::with_capacity(body.len());
    for (index, byte) in body.iter().enumerate() {
        // Keep only the last byte of a whitespace run.
        let next_is_space = body.get(index + 1).is_some_and(|next| is_space(*next));
        if is_space(*byte) && next_is_space {
            continue;
        }
        preview.push(*byte);
    }

    if preview.as_slice() == content {
        return None;
    }
    preview.shrink_to_fit();
    Some(preview)
}
