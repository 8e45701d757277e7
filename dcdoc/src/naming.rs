use std::path::Path;

/// Normalize a display name for file names and anchors.
///
/// Trims, lowercases, replaces spaces with `space` and drops parentheses and
/// commas.
pub fn clean_up_name(name: &str, space: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', space)
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ','))
        .collect()
}

/// Form-style URL encoding used in OMA-URI paths (`{` → `%7B`, space → `+`).
pub fn quote_plus(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// File name up to the first `.`, as used for unnamed groups and report titles.
pub fn file_stem(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .unwrap_or_default()
}

/// Path rendered with forward slashes and without a leading `./` or `.\`.
pub fn web_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    raw.strip_prefix("./").unwrap_or(&raw).to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{clean_up_name, file_stem, quote_plus, web_path};

    #[test]
    fn clean_up_name_matches_generated_file_names() {
        assert_eq!(
            clean_up_name(" Any Removable Storage (Read, Write) ", "_"),
            "any_removable_storage_read_write"
        );
        assert_eq!(clean_up_name("Printers", "-"), "printers");
    }

    #[test]
    fn quote_plus_encodes_guid_braces() {
        assert_eq!(
            quote_plus("{9b28fae8-72f7-4267-a1a5-685f747a7146}"),
            "%7B9b28fae8-72f7-4267-a1a5-685f747a7146%7D"
        );
        assert_eq!(quote_plus("a b"), "a+b");
    }

    #[test]
    fn file_stem_stops_at_first_dot() {
        assert_eq!(file_stem(Path::new("dir/devices.gpo.xml")), "devices");
    }

    #[test]
    fn web_path_normalizes_separators() {
        assert_eq!(web_path(Path::new(".\\samples\\a.xml")), "samples/a.xml");
    }
}
