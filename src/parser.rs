use crate::action::{
    ActionFile, ActionFileHeader, ActionItem, ActionType, SideSnapshot, UnknownToken,
};
use crate::error::{ActionFileError, ParseError};
use crate::generate::{HINT_JOIN, HINT_SEPARATOR};
use crate::models::Status;

const LINE_SHAPE: &str = "expected '[TOKEN] : STATUS : RELATIVE_PATH'";

/// Records `# Key: value` header fields the generator writes. Returns false
/// for any other comment.
fn read_header_field(header: &mut ActionFileHeader, comment: &str) -> bool {
    let Some((key, value)) = comment.trim_start_matches('#').trim().split_once(':') else {
        return false;
    };
    let value = value.trim().to_string();
    let slot = match key.trim() {
        "Generated" => &mut header.generated,
        "Left" => &mut header.left_root,
        "Right" => &mut header.right_root,
        "Version" => &mut header.version,
        _ => return false,
    };
    if slot.is_some() || value.is_empty() {
        return false;
    }
    *slot = Some(value);
    true
}

fn is_hint_list(text: &str) -> bool {
    text.split(HINT_JOIN).all(|part| {
        let part = part.trim();
        match part.strip_prefix("L:").or_else(|| part.strip_prefix("R:")) {
            Some(rest) => SideSnapshot::parse_hint(rest).is_some(),
            None => part.starts_with("perms "),
        }
    })
}

/// Splits off the generator's trailing hints. A separator followed by
/// anything other than hints is part of the path.
fn split_hints(line: &str) -> (&str, Option<&str>) {
    match line.rsplit_once(HINT_SEPARATOR) {
        Some((body, hints)) if is_hint_list(hints) => (body, Some(hints)),
        _ => (line, None),
    }
}

fn read_hints(hints: &str, item: &mut ActionItem) {
    for part in hints.split(HINT_JOIN) {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("L:") {
            item.left = SideSnapshot::parse_hint(rest);
        } else if let Some(rest) = part.strip_prefix("R:") {
            item.right = SideSnapshot::parse_hint(rest);
        }
    }
}

fn parse_item(line_no: usize, line: &str) -> Result<ActionItem, String> {
    let (body, hints) = split_hints(line);

    let mut fields = body.splitn(3, ':');
    let (Some(token_field), Some(status_field), Some(path_field)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(LINE_SHAPE.to_string());
    };

    let token = token_field
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| format!("action token must be in brackets, {}", LINE_SHAPE))?;
    let action: ActionType = token.parse().map_err(|e: UnknownToken| e.to_string())?;

    let status: Status = status_field.trim().parse()?;

    // Only the single space after the colon is layout; the rest is the name.
    let path = path_field
        .strip_prefix(' ')
        .unwrap_or(path_field)
        .replace('\\', "/");
    if path.trim().is_empty() {
        return Err("missing relative path".to_string());
    }

    let mut item = ActionItem::new(action, status, path);
    item.line = line_no;
    if let Some(hints) = hints {
        read_hints(hints, &mut item);
    }
    Ok(item)
}

/// Reads an edited action file.
///
/// Every bad line is reported with its line number; a single bad line makes
/// the whole document unusable.
pub fn parse(text: &str) -> Result<ActionFile, ActionFileError> {
    let mut file = ActionFile::default();
    let mut errors = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_start();
        if line.trim_end().is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if !read_header_field(&mut file.header, line) {
                file.comments.push(raw.to_string());
            }
            continue;
        }
        match parse_item(line_no, line) {
            Ok(item) => file.items.push(item),
            Err(message) => errors.push(ParseError {
                line: line_no,
                message,
            }),
        }
    }

    if errors.is_empty() {
        Ok(file)
    } else {
        Err(ActionFileError::Parse(errors))
    }
}
