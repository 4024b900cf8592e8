use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Header of the section whose links are classified.
pub const SECTION_TITLE: &str = "Décrets, arrêtés, circulaires";

const SECTION_LEVEL: &[u8] = b"1";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(#[from] AttrError),
    #[error("no root element")]
    NoRoot,
    #[error("document ends inside <{0}>")]
    Truncated(String),
}

/// The three fields read from a JORF container document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JorfDocument {
    /// First `<TITRE>`, trimmed. May be empty.
    pub title: Option<String>,
    /// First `<DATE_PUBLI>`, unparsed.
    pub publication_date: Option<String>,
    /// `titretxt` of every `<LIEN_TXT>` under the decrees/orders/circulars section.
    pub references: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Date,
    SectionTitle,
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

struct TmFrame {
    depth: usize,
    top_level: bool,
    in_scope: bool,
    /// Labels seen inside this top-level section before its title qualified it.
    pending: Vec<String>,
}

/// Single streaming pass over the document.
pub fn parse_document(xml: &str) -> Result<JorfDocument, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut doc = JorfDocument::default();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut sections: Vec<TmFrame> = Vec::new();
    let mut capture: Option<Capture> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_root = true;
                let parent_is_tm = stack.last().is_some_and(|n| n.as_slice() == b"TM");
                stack.push(e.name().as_ref().to_vec());
                let depth = stack.len();

                match e.name().as_ref() {
                    b"TM" => {
                        let top_level = e
                            .try_get_attribute("niv")?
                            .is_some_and(|a| a.value.as_ref() == SECTION_LEVEL);
                        sections.push(TmFrame {
                            depth,
                            top_level,
                            in_scope: false,
                            pending: Vec::new(),
                        });
                    }
                    b"LIEN_TXT" => collect_reference(&e, &mut sections, &mut doc)?,
                    name if capture.is_none() => {
                        let field = match name {
                            b"TITRE" if doc.title.is_none() => Some(Field::Title),
                            b"DATE_PUBLI" if doc.publication_date.is_none() => Some(Field::Date),
                            b"TITRE_TM" if parent_is_tm => Some(Field::SectionTitle),
                            _ => None,
                        };
                        capture = field.map(|field| Capture { field, depth, text: String::new() });
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                match e.name().as_ref() {
                    b"LIEN_TXT" => collect_reference(&e, &mut sections, &mut doc)?,
                    // <TITRE/> is still the first title, just an empty one.
                    b"TITRE" if doc.title.is_none() => doc.title = Some(String::new()),
                    b"DATE_PUBLI" if doc.publication_date.is_none() => {
                        doc.publication_date = Some(String::new())
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(c) = capture.take() {
                        finish_capture(c, &mut sections, &mut doc);
                    }
                }
                if sections.last().is_some_and(|f| f.depth == depth) {
                    if let Some(frame) = sections.pop() {
                        close_section(frame, &mut sections, &mut doc);
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(DocumentError::NoRoot);
    }
    if let Some(open) = stack.last() {
        return Err(DocumentError::Truncated(String::from_utf8_lossy(open).into_owned()));
    }
    Ok(doc)
}

fn finish_capture(c: Capture, sections: &mut [TmFrame], doc: &mut JorfDocument) {
    let text = c.text.trim();
    match c.field {
        Field::Title => doc.title = Some(text.to_string()),
        Field::Date => doc.publication_date = Some(text.to_string()),
        Field::SectionTitle => {
            if let Some(frame) = sections.last_mut() {
                if frame.top_level && text == SECTION_TITLE && !frame.in_scope {
                    frame.in_scope = true;
                    doc.references.append(&mut frame.pending);
                }
            }
        }
    }
}

/// A link belongs to the section as soon as any enclosing top-level `TM` is
/// qualified. Otherwise it waits in the innermost top-level frame, since that
/// frame's `TITRE_TM` may still follow.
fn collect_reference(
    e: &BytesStart,
    sections: &mut [TmFrame],
    doc: &mut JorfDocument,
) -> Result<(), DocumentError> {
    if !sections.iter().any(|f| f.top_level) {
        return Ok(());
    }
    let Some(attr) = e.try_get_attribute("titretxt")? else {
        return Ok(());
    };
    let label = attr.unescape_value()?.into_owned();
    if sections.iter().any(|f| f.in_scope) {
        doc.references.push(label);
    } else if let Some(frame) = sections.iter_mut().rev().find(|f| f.top_level) {
        frame.pending.push(label);
    }
    Ok(())
}

/// Unqualified labels move up to the next enclosing top-level frame, which
/// may still be qualified by a later title.
fn close_section(mut frame: TmFrame, sections: &mut [TmFrame], doc: &mut JorfDocument) {
    if frame.pending.is_empty() {
        return;
    }
    match sections.iter_mut().rev().find(|f| f.top_level) {
        Some(outer) if outer.in_scope => doc.references.append(&mut frame.pending),
        Some(outer) => outer.pending.append(&mut frame.pending),
        None => {}
    }
}
