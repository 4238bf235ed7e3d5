//! Canonical text form
//!
//! Command matching works on lowercase words separated by single spaces,
//! with punctuation, symbols and line breaks removed.

/// Convert arbitrary user input into canonical form.
///
/// Every character that is not alphanumeric acts as a word separator.
pub fn to_canonical(text: &str) -> String {
    let mut canonical = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !canonical.is_empty() {
                canonical.push(' ');
            }
            pending_space = false;
            canonical.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    canonical
}

pub fn is_canonical(text: &str) -> bool {
    to_canonical(text) == text
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "привет ирина включи свет";

    #[test]
    fn test_leave_canonical_unchanged() {
        assert_eq!(to_canonical(CANONICAL), CANONICAL);
    }

    #[test]
    fn test_strip() {
        assert_eq!(to_canonical("\t привет ирина включи свет\n"), CANONICAL);
    }

    #[test]
    fn test_drop_duplicate_whitespace() {
        assert_eq!(to_canonical("привет  ирина\t включи     свет"), CANONICAL);
    }

    #[test]
    fn test_drop_punctuation() {
        assert_eq!(to_canonical("привет, ирина! включи свет"), CANONICAL);
    }

    #[test]
    fn test_lowercase() {
        assert_eq!(to_canonical("Привет Ирина включи свет"), CANONICAL);
    }

    #[test]
    fn test_all() {
        assert_eq!(
            to_canonical("  \nПривет \nИрина!! !   включи свет!! :)))) ^_^"),
            CANONICAL
        );
    }

    #[test]
    fn test_digits_are_words() {
        assert_eq!(to_canonical("Поставь таймер на 5 минут."), "поставь таймер на 5 минут");
    }

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical(CANONICAL));
        assert!(!is_canonical("привет ирина включи свет "));
        assert!(!is_canonical(" привет ирина включи свет"));
        assert!(!is_canonical("привет ирина  включи свет"));
        assert!(!is_canonical("привет ирина\nвключи свет"));
        assert!(!is_canonical("привет ирина включи\tсвет"));
        assert!(!is_canonical("привет Ирина включи свет"));
    }
}
