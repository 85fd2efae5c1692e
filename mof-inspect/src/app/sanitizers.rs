use std::borrow::Cow;

/// Characters that must be escaped inside a MOF string literal
const STRING_ESCAPED_CHARS: [char; 6] = ['"', '\\', '\n', '\r', '\t', '\0'];

/// Escape `input` so it can be printed between double quotes
pub fn escape_string(input: &str) -> Cow<'_, str> {
    for (idx, c) in input.char_indices() {
        if STRING_ESCAPED_CHARS.contains(&c) || c.is_control() {
            let mut res = String::from(&input[..idx]);
            input[idx..].chars().for_each(|c| match c {
                '"' => res.push_str("\\\""),
                '\\' => res.push_str("\\\\"),
                '\n' => res.push_str("\\n"),
                '\r' => res.push_str("\\r"),
                '\t' => res.push_str("\\t"),
                c if c.is_control() => res.push_str(&format!("\\x{:04X}", c as u32)),
                _ => res.push(c),
            });
            return Cow::Owned(res);
        }
    }
    Cow::Borrowed(input)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use crate::app::sanitizers::escape_string;

    #[test]
    fn can_leave_plain_text() {
        assert!(matches!(escape_string("disk0"), Cow::Borrowed("disk0")));
    }

    #[test]
    fn can_escape_quotes() {
        assert_eq!(
            escape_string(r#"Inv_Disk.Name="disk0""#),
            r#"Inv_Disk.Name=\"disk0\""#
        );
    }

    #[test]
    fn can_escape_control_chars() {
        assert_eq!(escape_string("a\\b\nc\u{1}"), "a\\\\b\\nc\\x0001");
    }
}
