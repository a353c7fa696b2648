/// Renders `key: value` lines with keys right-aligned. A pair with an empty
/// key and value produces a blank line.
pub fn format_table(info: &[(&str, String)]) -> String {
    let max_key_len = info.iter().map(|(key, _)| key.len()).max().unwrap_or(0) + 2;
    let mut table = String::new();
    for (key, value) in info {
        if key.is_empty() && value.is_empty() {
            table.push('\n');
            continue;
        }
        table.push_str(&format!("{:>max_key_len$}: {}\n", key, value));
    }
    table
}

/// Renders rows as left-aligned columns under an upper-cased header.
pub fn format_columns(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = header.iter().map(|h| h.len()).collect::<Vec<usize>>();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render = |cells: &mut dyn Iterator<Item = String>| -> String {
        let line = cells
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<String>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let mut table = render(&mut header.iter().map(|h| h.to_uppercase()));
    for row in rows {
        table.push_str(&render(&mut row.iter().cloned()));
    }
    table
}

pub fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_owned()
}

/// Percent-encodes everything except RFC 3986 unreserved characters, so the
/// result is safe as a URI path segment or userinfo component.
pub fn encode_component(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_table_aligns_keys() {
        let table = format_table(&[("Name", "a".to_owned()), ("", String::new()), ("Version", "1".to_owned())]);
        assert_eq!(table, "     Name: a\n\n  Version: 1\n");
    }

    #[test]
    fn columns_are_padded_to_widest_cell() {
        let rows = vec![
            vec!["orders".to_owned(), "topic".to_owned()],
            vec!["x".to_owned(), "fanout".to_owned()],
        ];
        let table = format_columns(&["Name", "Type"], &rows);
        assert_eq!(table, "NAME    TYPE\norders  topic\nx       fanout\n");
    }

    #[test]
    fn component_encoding_keeps_unreserved_chars() {
        assert_eq!(encode_component("amq.gen-Ab_c~1"), "amq.gen-Ab_c~1");
        assert_eq!(encode_component("/"), "%2F");
        assert_eq!(encode_component("p@ss:word"), "p%40ss%3Aword");
        assert_eq!(encode_component("ü"), "%C3%BC");
    }

    #[test]
    fn empty_rows_render_header_only() {
        assert_eq!(format_columns(&["Name"], &[]), "NAME\n");
    }
}
