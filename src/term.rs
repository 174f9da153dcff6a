// used for date literals
use chrono::{NaiveDate, NaiveDateTime};
// used for decimal numbers
use bigdecimal::BigDecimal;

// used when parsing lexical forms
use std::str::FromStr;
// used to print out readable forms of a term
use std::fmt;
use std::ops;

use crate::error::{GraphObjectError, Result};
use crate::identifier::{Identifier, Seed};

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// A Rust type that can be carried as a literal.
pub trait LiteralType: Sized {
    // static stuff which needs to be implemented downstream
    const DATATYPE: &'static str;
    fn parse(lexical: &str) -> Option<Self>;
    fn wrap(self) -> Literal;
}

impl LiteralType for String {
    const DATATYPE: &'static str = XSD_STRING;
    fn parse(lexical: &str) -> Option<String> {
        Some(lexical.to_owned())
    }
    fn wrap(self) -> Literal {
        Literal::String(self)
    }
}
impl LiteralType for i64 {
    const DATATYPE: &'static str = XSD_INTEGER;
    fn parse(lexical: &str) -> Option<i64> {
        lexical.trim().parse().ok()
    }
    fn wrap(self) -> Literal {
        Literal::Integer(self)
    }
}
impl LiteralType for Decimal {
    const DATATYPE: &'static str = XSD_DECIMAL;
    fn parse(lexical: &str) -> Option<Decimal> {
        Decimal::from_str(lexical.trim())
    }
    fn wrap(self) -> Literal {
        Literal::Decimal(self)
    }
}
impl LiteralType for bool {
    const DATATYPE: &'static str = XSD_BOOLEAN;
    fn parse(lexical: &str) -> Option<bool> {
        match lexical.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
    fn wrap(self) -> Literal {
        Literal::Boolean(self)
    }
}
impl LiteralType for NaiveDate {
    const DATATYPE: &'static str = XSD_DATE;
    fn parse(lexical: &str) -> Option<NaiveDate> {
        NaiveDate::from_str(lexical.trim()).ok()
    }
    fn wrap(self) -> Literal {
        Literal::Date(self)
    }
}
impl LiteralType for NaiveDateTime {
    const DATATYPE: &'static str = XSD_DATE_TIME;
    fn parse(lexical: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::from_str(lexical.trim()).ok()
    }
    fn wrap(self) -> Literal {
        Literal::DateTime(self)
    }
}

#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn from_str(s: &str) -> Option<Decimal> {
        match BigDecimal::from_str(s) {
            Ok(decimal) => Some(Decimal(decimal)),
            _ => None,
        }
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A literal datum in its canonical in-memory representation.
///
/// Literals whose datatype is not one of the known XSD types are kept
/// verbatim in [`Literal::Other`] so nothing read from a store is lost.
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Other { lexical: String, datatype: String },
}

impl Literal {
    pub fn datatype(&self) -> &str {
        match self {
            Literal::Boolean(_) => bool::DATATYPE,
            Literal::Integer(_) => i64::DATATYPE,
            Literal::Decimal(_) => Decimal::DATATYPE,
            Literal::String(_) => String::DATATYPE,
            Literal::Date(_) => NaiveDate::DATATYPE,
            Literal::DateTime(_) => NaiveDateTime::DATATYPE,
            Literal::Other { datatype, .. } => datatype,
        }
    }
    pub fn lexical(&self) -> String {
        match self {
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Decimal(d) => d.to_string(),
            Literal::String(s) => s.clone(),
            Literal::Date(d) => d.format("%Y-%m-%d").to_string(),
            Literal::DateTime(d) => d.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Literal::Other { lexical, .. } => lexical.clone(),
        }
    }
    /// Deserializes a stored lexical form. A lexical form that does not
    /// parse under its declared datatype is kept as [`Literal::Other`].
    pub fn from_lexical(lexical: &str, datatype: Option<&str>) -> Literal {
        let datatype = datatype.unwrap_or(XSD_STRING);
        let parsed = match datatype {
            XSD_STRING => <String as LiteralType>::parse(lexical).map(LiteralType::wrap),
            XSD_INTEGER => <i64 as LiteralType>::parse(lexical).map(LiteralType::wrap),
            XSD_DECIMAL => <Decimal as LiteralType>::parse(lexical).map(LiteralType::wrap),
            XSD_BOOLEAN => <bool as LiteralType>::parse(lexical).map(LiteralType::wrap),
            XSD_DATE => <NaiveDate as LiteralType>::parse(lexical).map(LiteralType::wrap),
            XSD_DATE_TIME => <NaiveDateTime as LiteralType>::parse(lexical).map(LiteralType::wrap),
            _ => None,
        };
        parsed.unwrap_or_else(|| Literal::Other {
            lexical: lexical.to_owned(),
            datatype: datatype.to_owned(),
        })
    }
    pub fn seed(&self) -> Seed {
        Seed::Text(format!("{}^^{}", self.lexical(), self.datatype()))
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Integer(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.lexical())
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_owned())
    }
}
impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}
impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}
impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}
impl From<Decimal> for Literal {
    fn from(d: Decimal) -> Self {
        Literal::Decimal(d)
    }
}
impl From<NaiveDate> for Literal {
    fn from(d: NaiveDate) -> Self {
        Literal::Date(d)
    }
}
impl From<NaiveDateTime> for Literal {
    fn from(d: NaiveDateTime) -> Self {
        Literal::DateTime(d)
    }
}

/// The object position of a statement.
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub enum Term {
    Iri(Identifier),
    Literal(Literal),
}

impl Term {
    pub fn lexical(&self) -> String {
        match self {
            Term::Iri(iri) => iri.to_string(),
            Term::Literal(literal) => literal.lexical(),
        }
    }
    /// `None` for IRIs, the literal's datatype otherwise.
    pub fn datatype(&self) -> Option<&str> {
        match self {
            Term::Iri(_) => None,
            Term::Literal(literal) => Some(literal.datatype()),
        }
    }
    pub fn from_parts(lexical: &str, datatype: Option<&str>) -> Term {
        match datatype {
            None => Term::Iri(Identifier::new(lexical)),
            Some(datatype) => Term::Literal(Literal::from_lexical(lexical, Some(datatype))),
        }
    }
    pub fn as_iri(&self) -> Option<&Identifier> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal(_) => None,
        }
    }
}
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Literal(literal) => {
                write!(f, "\"{}\"", escape(&literal.lexical()))?;
                if literal.datatype() != XSD_STRING {
                    write!(f, "^^<{}>", literal.datatype())?;
                }
                Ok(())
            }
        }
    }
}
impl From<Identifier> for Term {
    fn from(iri: Identifier) -> Self {
        Term::Iri(iri)
    }
}
impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Term::Literal(literal)
    }
}

pub(crate) fn escape(lexical: &str) -> String {
    let mut escaped = String::with_capacity(lexical.len());
    for c in lexical.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Decodes N-Quads string escapes, including `\uXXXX` and `\UXXXXXXXX`.
pub(crate) fn unescape(escaped: &str) -> Result<String> {
    let mut lexical = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            lexical.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => lexical.push('\n'),
            Some('r') => lexical.push('\r'),
            Some('t') => lexical.push('\t'),
            Some('b') => lexical.push('\u{8}'),
            Some('f') => lexical.push('\u{c}'),
            Some('u') => lexical.push(code_point(&mut chars, 4)?),
            Some('U') => lexical.push(code_point(&mut chars, 8)?),
            Some(other) => lexical.push(other),
            None => lexical.push('\\'),
        }
    }
    Ok(lexical)
}

fn code_point(chars: &mut std::str::Chars, digits: usize) -> Result<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    let invalid = || GraphObjectError::Parse {
        message: format!("invalid code point escape: {}", hex),
        line: None,
    };
    if hex.len() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_literals_come_back_canonical() {
        assert_eq!(Literal::from_lexical("42", Some(XSD_INTEGER)), Literal::Integer(42));
        assert_eq!(Literal::from_lexical("true", Some(XSD_BOOLEAN)), Literal::Boolean(true));
        assert_eq!(Literal::from_lexical("AVAL", None), Literal::from("AVAL"));
        assert_eq!(
            Literal::from_lexical("2015-06-01", Some(XSD_DATE)),
            Literal::Date(NaiveDate::from_ymd_opt(2015, 6, 1).expect("date"))
        );
    }

    #[test]
    fn unparseable_and_unknown_literals_are_kept() {
        let odd = Literal::from_lexical("forty", Some(XSD_INTEGER));
        assert_eq!(odd.lexical(), "forty");
        assert_eq!(odd.datatype(), XSD_INTEGER);
        let custom = Literal::from_lexical("x", Some("http://example.org/dt"));
        assert_eq!(custom.datatype(), "http://example.org/dt");
    }

    #[test]
    fn code_point_escapes_are_decoded() {
        assert_eq!(unescape("caf\\u00E9").expect("short"), "café");
        assert_eq!(unescape("\\U0001F41B worm").expect("long"), "\u{1F41B} worm");
        assert!(unescape("\\uD800").is_err());
        assert!(unescape("\\u00").is_err());
        assert!(unescape("\\u00zz").is_err());
    }

    #[test]
    fn escaping_survives_a_round_trip() {
        let raw = "say \"hi\"\n\tback\\slash";
        assert_eq!(unescape(&escape(raw)).expect("unescape"), raw);
    }
}
