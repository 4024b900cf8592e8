use chrono::NaiveDate;
use serde::Serialize;

use super::document::JorfDocument;
use crate::utils::{normalize, NOT_AVAILABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Decree,
    Order,
    Circular,
    Other,
}

/// Checked in order; the first keyword found in the normalized label wins.
const KEYWORDS: &[(&str, Category)] = &[
    ("decret", Category::Decree),
    ("arrete", Category::Order),
    ("circulaire", Category::Circular),
];

pub fn classify(label: &str) -> Category {
    let normalized = normalize(label);
    KEYWORDS
        .iter()
        .find(|(kw, _)| normalized.contains(kw))
        .map(|(_, cat)| *cat)
        .unwrap_or(Category::Other)
}

/// Inclusive publication-date window. A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// One output row. Field names match the exported column headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub title: String,
    #[serde(rename = "date publication")]
    pub date_publication: String,
    #[serde(rename = "nb decrets")]
    pub nb_decrets: usize,
    pub decrets: Vec<String>,
    #[serde(rename = "nb arretes")]
    pub nb_arretes: usize,
    pub arretes: Vec<String>,
    #[serde(rename = "nb circulaires")]
    pub nb_circulaires: usize,
    pub circulaires: Vec<String>,
    #[serde(rename = "nb autres")]
    pub nb_autres: usize,
    pub autres: Vec<String>,
}

impl SummaryRecord {
    fn push(&mut self, category: Category, label: String) {
        let (count, list) = match category {
            Category::Decree => (&mut self.nb_decrets, &mut self.decrets),
            Category::Order => (&mut self.nb_arretes, &mut self.arretes),
            Category::Circular => (&mut self.nb_circulaires, &mut self.circulaires),
            Category::Other => (&mut self.nb_autres, &mut self.autres),
        };
        *count += 1;
        list.push(label);
    }

    pub fn has_primary(&self) -> bool {
        self.nb_decrets + self.nb_arretes + self.nb_circulaires > 0
    }
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Summarized(SummaryRecord),
    OutOfRange,
    /// Nothing classified as decree, order or circular.
    NoRelevantReferences,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("publication date {0:?} is not a YYYY-MM-DD date")]
    InvalidDate(String),
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn summarize(doc: &JorfDocument, range: &DateRange) -> Result<Outcome, SummaryError> {
    let raw_date = doc.publication_date.as_deref().unwrap_or(NOT_AVAILABLE);
    let date = parse_date(raw_date).ok_or_else(|| SummaryError::InvalidDate(raw_date.to_string()))?;
    if !range.contains(date) {
        return Ok(Outcome::OutOfRange);
    }

    let title = doc
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(NOT_AVAILABLE);

    let mut record = SummaryRecord {
        title: title.to_string(),
        date_publication: raw_date.to_string(),
        ..Default::default()
    };
    for label in &doc.references {
        record.push(classify(label), label.clone());
    }

    if !record.has_primary() {
        return Ok(Outcome::NoRelevantReferences);
    }
    Ok(Outcome::Summarized(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn doc(title: Option<&str>, date: Option<&str>, refs: &[&str]) -> JorfDocument {
        JorfDocument {
            title: title.map(String::from),
            publication_date: date.map(String::from),
            references: refs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn classify_by_keyword() {
        assert_eq!(classify("Décret n° 2024-789 du 15 juillet 2024"), Category::Decree);
        assert_eq!(classify("ARRÊTÉ du 12 juillet 2024"), Category::Order);
        assert_eq!(classify("Circulaire du 3 juillet"), Category::Circular);
        assert_eq!(classify("Avis de vacance"), Category::Other);
    }

    #[test]
    fn classify_priority_decree_first() {
        assert_eq!(classify("Arrêté pris en application du décret n° 2020-1"), Category::Decree);
        assert_eq!(classify("Circulaire relative aux arrêtés"), Category::Order);
    }

    #[test]
    fn classify_accent_insensitive() {
        assert_eq!(classify("decret"), classify("Décret"));
        assert_eq!(classify("De\u{301}cret"), Category::Decree);
    }

    #[test]
    fn date_range_inclusive_bounds() {
        let r = DateRange::new(Some(date("2024-07-16")), Some(date("2025-09-05")));
        assert!(!r.contains(date("2024-07-15")));
        assert!(r.contains(date("2024-07-16")));
        assert!(r.contains(date("2025-09-05")));
        assert!(!r.contains(date("2025-09-06")));
    }

    #[test]
    fn date_range_bounds_are_independent() {
        let start_only = DateRange::new(Some(date("2024-07-16")), None);
        assert!(start_only.contains(date("2030-01-01")));
        assert!(!start_only.contains(date("2024-07-15")));

        let end_only = DateRange::new(None, Some(date("2024-07-16")));
        assert!(end_only.contains(date("1990-01-01")));
        assert!(!end_only.contains(date("2024-07-17")));

        assert!(DateRange::default().contains(date("2024-07-16")));
    }

    #[test]
    fn summarize_issue_with_all_categories() {
        let d = doc(
            Some("JORF du 16 juillet 2024"),
            Some("2024-07-16"),
            &["Décret n°1", "Arrêté n°2", "Note interne n°3"],
        );
        let range = DateRange::new(Some(date("2024-07-16")), Some(date("2025-09-05")));
        let Outcome::Summarized(r) = summarize(&d, &range).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(r.title, "JORF du 16 juillet 2024");
        assert_eq!(r.date_publication, "2024-07-16");
        assert_eq!((r.nb_decrets, r.decrets.as_slice()), (1, ["Décret n°1".to_string()].as_slice()));
        assert_eq!((r.nb_arretes, r.arretes.as_slice()), (1, ["Arrêté n°2".to_string()].as_slice()));
        assert_eq!(r.nb_circulaires, 0);
        assert!(r.circulaires.is_empty());
        assert_eq!(r.autres, ["Note interne n°3"]);
        assert_eq!(r.nb_autres, 1);
    }

    #[test]
    fn summarize_keeps_label_order_within_category() {
        let d = doc(Some("t"), Some("2024-07-16"), &["Décret B", "Note", "décret A"]);
        let Outcome::Summarized(r) = summarize(&d, &DateRange::default()).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(r.decrets, ["Décret B", "décret A"]);
    }

    #[test]
    fn summarize_excludes_others_only() {
        let d = doc(Some("t"), Some("2024-07-16"), &["Avis", "Note interne"]);
        assert_eq!(summarize(&d, &DateRange::default()).unwrap(), Outcome::NoRelevantReferences);
        let empty = doc(Some("t"), Some("2024-07-16"), &[]);
        assert_eq!(summarize(&empty, &DateRange::default()).unwrap(), Outcome::NoRelevantReferences);
    }

    #[test]
    fn summarize_out_of_range() {
        let d = doc(Some("t"), Some("2025-09-06"), &["Décret"]);
        let range = DateRange::new(Some(date("2024-07-16")), Some(date("2025-09-05")));
        assert_eq!(summarize(&d, &range).unwrap(), Outcome::OutOfRange);
    }

    #[test]
    fn missing_title_uses_sentinel() {
        for title in [None, Some("")] {
            let d = doc(title, Some("2024-07-16"), &["Circulaire"]);
            let Outcome::Summarized(r) = summarize(&d, &DateRange::default()).unwrap() else {
                panic!("expected a record");
            };
            assert_eq!(r.title, NOT_AVAILABLE);
        }
    }

    #[test]
    fn missing_or_bad_date_is_an_error() {
        let d = doc(Some("t"), None, &["Décret"]);
        let err = summarize(&d, &DateRange::default()).unwrap_err();
        assert!(matches!(err, SummaryError::InvalidDate(ref v) if v == NOT_AVAILABLE));

        let d = doc(Some("t"), Some("16/07/2024"), &["Décret"]);
        assert!(summarize(&d, &DateRange::default()).is_err());
    }

    #[test]
    fn serializes_with_column_names() {
        let r = SummaryRecord {
            title: "t".into(),
            date_publication: "2024-07-16".into(),
            nb_decrets: 1,
            decrets: vec!["Décret".into()],
            ..Default::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["date publication"], "2024-07-16");
        assert_eq!(v["nb decrets"], 1);
        assert_eq!(v["nb autres"], 0);
        assert!(v["circulaires"].as_array().unwrap().is_empty());
    }
}
