use std::path::{Path, PathBuf};

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::UnicodeNormalization;

/// Placeholder for a missing title or publication date.
pub const NOT_AVAILABLE: &str = "NA";

pub const DOCUMENT_PREFIX: &str = "JORF";
pub const DOCUMENT_SUFFIX: &str = ".xml";

/// NFD, drop nonspacing marks (Mn), lowercase. "Arrêté" → "arrete".
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| get_general_category(*c) != GeneralCategory::NonspacingMark)
        .collect::<String>()
        .to_lowercase()
}

/// Final location of an extracted document: `<dir>/JORF_<date>.xml`.
pub fn document_path(dir: &Path, date: &str) -> PathBuf {
    let safe: String = date
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{}_{}{}", DOCUMENT_PREFIX, safe, DOCUMENT_SUFFIX))
}

/// Last `/`-separated segment of an archive member path or URL path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents() {
        assert_eq!(normalize("Décret"), normalize("decret"));
        assert_eq!(normalize("Arrêté"), "arrete");
        assert_eq!(normalize("CIRCULAIRE"), "circulaire");
    }

    #[test]
    fn normalize_decomposed_input() {
        // "e" followed by U+0301 COMBINING ACUTE ACCENT
        assert_eq!(normalize("De\u{301}cret"), "decret");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["Décret n° 2024-789", "ARRÊTÉ du 15 juillet", "Œuvre çà et là", "İstanbul", ""] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn normalize_keeps_non_mark_symbols() {
        assert_eq!(normalize("Note interne n°3"), "note interne n°3");
    }

    #[test]
    fn document_path_uses_date() {
        let p = document_path(Path::new("/data/xml"), "2024-07-16");
        assert_eq!(p, PathBuf::from("/data/xml/JORF_2024-07-16.xml"));
        assert_eq!(
            document_path(Path::new("x"), NOT_AVAILABLE),
            PathBuf::from("x/JORF_NA.xml")
        );
    }

    #[test]
    fn document_path_stays_in_dir() {
        let p = document_path(Path::new("out"), "../../etc/passwd");
        assert_eq!(p.parent(), Some(Path::new("out")));
    }

    #[test]
    fn basename_of_member() {
        assert_eq!(basename("./20240716/jorf/global/JORF/CONT/00/JORFCONT01.xml"), "JORFCONT01.xml");
        assert_eq!(basename("JORF_20240716-1.tar.gz"), "JORF_20240716-1.tar.gz");
    }
}
