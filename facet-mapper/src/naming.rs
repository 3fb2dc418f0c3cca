//! Splitting field and property names into comparable segments.
//!
//! A name is cut at separators (`_`, `-`, `.`, whitespace) and at case
//! transitions, so `address_city`, `addressCity`, `ADDRESS_CITY` and
//! `address.city` all yield two segments. Digits stay attached to the segment
//! they follow (`line2Address` → `line2`, `Address`), and a run of capitals
//! keeps together until the last one starts a new word
//! (`HTTPServer` → `HTTP`, `Server`).

/// A segment of a name, as a byte range into the name it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    start: usize,
    end: usize,
}

impl Segment {
    /// Byte offset of the segment's first character.
    pub const fn start(self) -> usize {
        self.start
    }

    /// Byte offset one past the segment's last character.
    pub const fn end(self) -> usize {
        self.end
    }

    /// The segment's text within `name`.
    pub fn text(self, name: &str) -> &str {
        &name[self.start..self.end]
    }
}

/// Whether `c` separates segments and is not part of any segment.
pub fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '.') || c.is_whitespace()
}

/// Split `name` into segments.
pub fn split(name: &str) -> Vec<Segment> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;

    for (pos, &(offset, c)) in chars.iter().enumerate() {
        if is_separator(c) {
            if let Some(s) = start.take() {
                segments.push(Segment { start: s, end: offset });
            }
            continue;
        }

        let Some(s) = start else {
            start = Some(offset);
            continue;
        };

        // `start` is set, so the previous char belongs to the current segment.
        let prev = chars[pos - 1].1;
        let next = chars.get(pos + 1).map(|&(_, c)| c);
        let boundary = c.is_uppercase()
            && (prev.is_lowercase()
                || prev.is_numeric()
                || (prev.is_uppercase() && next.is_some_and(char::is_lowercase)));

        if boundary {
            segments.push(Segment { start: s, end: offset });
            start = Some(offset);
        }
    }

    if let Some(s) = start {
        segments.push(Segment {
            start: s,
            end: name.len(),
        });
    }

    segments
}

/// Segment texts of `name`, for callers that do not need offsets.
pub fn split_str(name: &str) -> Vec<&str> {
    split(name).into_iter().map(|s| s.text(name)).collect()
}

/// Case-insensitive comparison of `single` with the concatenation of `parts`.
pub fn eq_ignore_case_joined<'a>(single: &str, parts: impl IntoIterator<Item = &'a str>) -> bool {
    single.chars().flat_map(char::to_lowercase).eq(parts
        .into_iter()
        .flat_map(|part| part.chars().flat_map(char::to_lowercase)))
}

/// Lower-case the first character: `FirstName` → `firstName`.
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_separators() {
        assert_eq!(split_str("address_city"), ["address", "city"]);
        assert_eq!(split_str("address.city"), ["address", "city"]);
        assert_eq!(split_str("first name"), ["first", "name"]);
        assert_eq!(split_str("__id__"), ["id"]);
        assert_eq!(split_str("a--b"), ["a", "b"]);
    }

    #[test]
    fn splits_on_case_transitions() {
        assert_eq!(split_str("addressCity"), ["address", "City"]);
        assert_eq!(split_str("AddressCity"), ["Address", "City"]);
        assert_eq!(split_str("HTTPServer"), ["HTTP", "Server"]);
        assert_eq!(split_str("ADDRESS_CITY"), ["ADDRESS", "CITY"]);
        assert_eq!(split_str("userID"), ["user", "ID"]);
    }

    #[test]
    fn digits_stay_with_preceding_segment() {
        assert_eq!(split_str("line2Address"), ["line2", "Address"]);
        assert_eq!(split_str("col1"), ["col1"]);
    }

    #[test]
    fn empty_and_separator_only_names() {
        assert!(split("").is_empty());
        assert!(split("_._").is_empty());
    }

    #[test]
    fn segments_point_into_original() {
        let name = "ab_cd";
        let segments = split(name);
        assert_eq!(segments[1].start(), 3);
        assert_eq!(segments[1].end(), 5);
        assert_eq!(segments[1].text(name), "cd");
    }

    #[test]
    fn joined_comparison() {
        assert!(eq_ignore_case_joined("firstname", ["first", "Name"]));
        assert!(eq_ignore_case_joined("FIRSTNAME", ["first", "name"]));
        assert!(!eq_ignore_case_joined("firstname", ["first"]));
    }

    #[test]
    fn decapitalizes() {
        assert_eq!(decapitalize("FirstName"), "firstName");
        assert_eq!(decapitalize("x"), "x");
        assert_eq!(decapitalize(""), "");
    }
}
