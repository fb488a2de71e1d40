use std::collections::BTreeSet;

/// Набор паттернов для регистронезависимого поиска подстроки в классе UI.
///
/// Паттерны нормализуются один раз при построении, чтобы на горячем пути
/// оставалась одна аллокация на `to_lowercase` входной строки.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns_lower: BTreeSet<String>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns_lower = patterns
            .iter()
            .map(|pattern| pattern.as_ref().trim().to_lowercase())
            .filter(|pattern| !pattern.is_empty())
            .collect();

        Self { patterns_lower }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns_lower.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns_lower.len()
    }

    /// Пустой набор не совпадает ни с чем
    pub fn matches(&self, hint: &str) -> bool {
        if self.patterns_lower.is_empty() || hint.is_empty() {
            return false;
        }

        let hint_lower = hint.to_lowercase();
        self.patterns_lower
            .iter()
            .any(|pattern| hint_lower.contains(pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_substring() {
        let set = PatternSet::new(&["InputMethod", "IME"]);

        assert!(set.matches("com.android.inputmethod.latin.LatinIME"));
        assert!(set.matches("SoftInputMethodWindow"));
        assert!(set.matches("ime-popup"));
        assert!(!set.matches("BrowserWindow"));
    }

    #[test]
    fn test_empty_patterns_match_nothing() {
        let set = PatternSet::new::<&str>(&[]);
        assert!(set.is_empty());
        assert!(!set.matches("anything"));

        let set = PatternSet::new(&["  ", ""]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let set = PatternSet::new(&["LockScreen", "lockscreen", " LOCKSCREEN "]);
        assert_eq!(set.len(), 1);
    }
}
