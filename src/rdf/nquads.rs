//! Line-based N-Quads / N-Triples reading and writing
//!
//! Each non-empty, non-comment line holds exactly one statement. Relative
//! IRIs are resolved against the document base so that feeds served with
//! page-relative links still produce absolute fragment identifiers.

use crate::rdf::{jsonld, vocab, Quad, Term};
use crate::stream::{DocumentParser, Serializer};
use crate::{Result, TideError};
use async_trait::async_trait;
use url::Url;

/// Media types understood by [`NQuadsParser`]
pub const NQUADS: &str = "application/n-quads";
pub const NTRIPLES: &str = "application/n-triples";
pub const JSON_LD: &str = "application/ld+json";

/// Parser for `application/n-quads` and `application/n-triples` documents
#[derive(Debug, Clone, Default)]
pub struct NQuadsParser;

#[async_trait]
impl DocumentParser for NQuadsParser {
    async fn parse(&self, body: &str, base_url: &str, media_type: &str) -> Result<Vec<Quad>> {
        match media_type {
            NQUADS | NTRIPLES | "text/plain" => parse_document(body, base_url),
            other => Err(TideError::UnsupportedMediaType(other.to_string())),
        }
    }
}

/// Serializer producing N-Quads, N-Triples or flat JSON-LD text
#[derive(Debug, Clone, Default)]
pub struct QuadSerializer;

#[async_trait]
impl Serializer for QuadSerializer {
    async fn serialize(&self, quads: &[Quad], media_type: &str) -> Result<String> {
        match media_type {
            NQUADS => Ok(write_quads(quads, true)),
            NTRIPLES => Ok(write_quads(quads, false)),
            JSON_LD => Ok(serde_json::to_string(&jsonld::flatten(quads))?),
            other => Err(TideError::UnsupportedMediaType(other.to_string())),
        }
    }
}

/// Returns true if the default serializer can produce the given media type
pub fn is_supported_output(media_type: &str) -> bool {
    matches!(media_type, NQUADS | NTRIPLES | JSON_LD)
}

/// Parses a whole N-Quads document
///
/// # Arguments
///
/// * `body` - The document text
/// * `base_url` - Base for resolving relative IRIs
///
/// # Returns
///
/// * `Ok(Vec<Quad>)` - Statements in document order
/// * `Err(TideError::Parse)` - The first malformed line
pub fn parse_document(body: &str, base_url: &str) -> Result<Vec<Quad>> {
    let base = Url::parse(base_url).ok();
    let mut quads = Vec::new();

    for (index, raw_line) in body.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let quad = parse_statement(line, base.as_ref()).map_err(|message| TideError::Parse {
            base: base_url.to_string(),
            line: index + 1,
            message,
        })?;
        quads.push(quad);
    }

    Ok(quads)
}

fn parse_statement(line: &str, base: Option<&Url>) -> std::result::Result<Quad, String> {
    let mut cursor = Cursor::new(line, base);

    let subject = cursor.term()?;
    if !subject.is_reference() {
        return Err("subject must be an IRI or blank node".to_string());
    }

    cursor.skip_whitespace();
    let predicate = cursor.term()?;
    if !predicate.is_named_node() {
        return Err("predicate must be an IRI".to_string());
    }

    cursor.skip_whitespace();
    let object = cursor.term()?;

    cursor.skip_whitespace();
    let graph = if cursor.peek() == Some('.') {
        Term::DefaultGraph
    } else {
        let graph = cursor.term()?;
        if !graph.is_reference() {
            return Err("graph label must be an IRI or blank node".to_string());
        }
        cursor.skip_whitespace();
        graph
    };

    cursor.expect('.')?;
    cursor.skip_whitespace();
    if !(cursor.is_done() || cursor.peek() == Some('#')) {
        return Err(format!("unexpected trailing input at column {}", cursor.pos + 1));
    }

    Ok(Quad {
        subject,
        predicate,
        object,
        graph,
    })
}

/// Parses one term that must span the whole input
pub(crate) fn parse_single_term(input: &str) -> std::result::Result<Term, String> {
    let mut cursor = Cursor::new(input, None);
    let term = cursor.term()?;
    if !cursor.is_done() {
        return Err("unexpected input after term".to_string());
    }
    Ok(term)
}

/// Escapes a literal value for N-Triples output
pub(crate) fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn write_quads(quads: &[Quad], with_graph: bool) -> String {
    let mut out = String::new();
    for quad in quads {
        out.push_str(&quad.subject.to_term_string());
        out.push(' ');
        out.push_str(&quad.predicate.to_term_string());
        out.push(' ');
        out.push_str(&quad.object.to_term_string());
        if with_graph && !quad.graph.is_default_graph() {
            out.push(' ');
            out.push_str(&quad.graph.to_term_string());
        }
        out.push_str(" .\n");
    }
    out
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    base: Option<&'a Url>,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, base: Option<&'a Url>) -> Self {
        Self {
            input,
            pos: 0,
            base,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn is_done(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> std::result::Result<(), String> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{}', found '{}'", expected, c)),
            None => Err(format!("expected '{}', found end of line", expected)),
        }
    }

    fn term(&mut self) -> std::result::Result<Term, String> {
        match self.peek() {
            Some('<') => self.iri().map(Term::NamedNode),
            Some('_') => self.blank_node(),
            Some('"') => self.literal(),
            Some(c) => Err(format!("unexpected '{}' at column {}", c, self.pos + 1)),
            None => Err("unexpected end of line".to_string()),
        }
    }

    fn iri(&mut self) -> std::result::Result<String, String> {
        self.expect('<')?;
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some('\\') => iri.push(self.unicode_escape()?),
                Some(c) => iri.push(c),
                None => return Err("unterminated IRI".to_string()),
            }
        }
        Ok(self.resolve(iri))
    }

    fn resolve(&self, iri: String) -> String {
        if Url::parse(&iri).is_ok() {
            return iri;
        }
        match self.base.map(|base| base.join(&iri)) {
            Some(Ok(resolved)) => resolved.to_string(),
            _ => iri,
        }
    }

    fn blank_node(&mut self) -> std::result::Result<Term, String> {
        self.expect('_')?;
        self.expect(':')?;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            self.bump();
        }
        // A trailing '.' terminates the statement, not the label
        while self.pos > start && self.input[..self.pos].ends_with('.') {
            self.pos -= 1;
        }
        if self.pos == start {
            return Err("empty blank node label".to_string());
        }
        Ok(Term::BlankNode(self.input[start..self.pos].to_string()))
    }

    fn literal(&mut self) -> std::result::Result<Term, String> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => value.push(self.string_escape()?),
                Some(c) => value.push(c),
                None => return Err("unterminated literal".to_string()),
            }
        }

        match self.peek() {
            Some('@') => {
                self.pos += 1;
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '-') {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err("empty language tag".to_string());
                }
                Ok(Term::lang_literal(value, &self.input[start..self.pos]))
            }
            Some('^') => {
                self.expect('^')?;
                self.expect('^')?;
                let datatype = self.iri()?;
                if datatype == vocab::XSD_STRING {
                    Ok(Term::literal(value))
                } else {
                    Ok(Term::typed_literal(value, datatype))
                }
            }
            _ => Ok(Term::literal(value)),
        }
    }

    fn string_escape(&mut self) -> std::result::Result<char, String> {
        match self.peek() {
            Some('t') => self.simple_escape('\t'),
            Some('b') => self.simple_escape('\u{08}'),
            Some('n') => self.simple_escape('\n'),
            Some('r') => self.simple_escape('\r'),
            Some('f') => self.simple_escape('\u{0C}'),
            Some('"') => self.simple_escape('"'),
            Some('\'') => self.simple_escape('\''),
            Some('\\') => self.simple_escape('\\'),
            _ => self.unicode_escape(),
        }
    }

    fn simple_escape(&mut self, c: char) -> std::result::Result<char, String> {
        self.pos += 1;
        Ok(c)
    }

    fn unicode_escape(&mut self) -> std::result::Result<char, String> {
        let width = match self.bump() {
            Some('u') => 4,
            Some('U') => 8,
            Some(c) => return Err(format!("invalid escape '\\{}'", c)),
            None => return Err("dangling escape".to_string()),
        };
        let end = self.pos + width;
        let hex = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| "truncated unicode escape".to_string())?;
        let code = u32::from_str_radix(hex, 16).map_err(|e| format!("bad unicode escape: {}", e))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| format!("invalid code point {:X}", code))
    }
}
