//! `Authorization` header parsing and serialization.
//!
//! The header is `<scheme> name="value", name="value", ...`. Names are
//! identifiers; values are double-quoted strings in which `\"` and `\\` are
//! the only escapes.

use crate::error::{AuthError, AuthResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

const KNOWN_PARAMETERS: [&str; 6] = ["id", "ts", "nonce", "ext", "hash", "mac"];

/// Parameters carried by a Hawk `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParameters {
    /// Key identifier.
    pub id: String,
    /// Client timestamp, seconds since the epoch.
    pub timestamp: i64,
    /// Single-use token.
    pub nonce: String,
    /// Application extension data; empty when absent.
    pub ext: String,
    /// Decoded payload hash, when the client opted into body authentication.
    pub hash: Option<Vec<u8>>,
    /// Decoded request MAC.
    pub mac: Vec<u8>,
}

impl AuthParameters {
    /// Parses a full header value, checking the scheme token exactly.
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedHeader`] if the scheme does not match, or
    /// [`AuthError::MalformedParameters`] if the parameter list is invalid.
    pub fn from_header(header: &str, scheme: &str) -> AuthResult<Self> {
        let (token, rest) = header.split_once(' ').ok_or(AuthError::MalformedHeader)?;
        if token != scheme {
            return Err(AuthError::MalformedHeader);
        }
        Self::parse(rest)
    }

    /// Parses the parameter list that follows the scheme token.
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedParameters`] on unexpected tokens, unknown or
    /// duplicate names, missing required names, a non-integer `ts`, or
    /// `hash`/`mac` values that are not standard base64.
    pub fn parse(src: &str) -> AuthResult<Self> {
        let mut items = BTreeMap::new();
        let mut tokens = Tokenizer::new(src);

        loop {
            let name = match tokens.next().transpose()? {
                Some(Token::Ident(name)) => name,
                _ => return Err(AuthError::malformed("expected parameter name")),
            };
            if !matches!(tokens.next().transpose()?, Some(Token::Equals)) {
                return Err(AuthError::malformed(format!("expected '=' after {name}")));
            }
            let value = match tokens.next().transpose()? {
                Some(Token::Quoted(value)) => value,
                _ => return Err(AuthError::malformed(format!("expected quoted value for {name}"))),
            };

            if !KNOWN_PARAMETERS.contains(&name.as_str()) {
                return Err(AuthError::malformed(format!("unknown parameter {name}")));
            }
            if items.insert(name.clone(), value).is_some() {
                return Err(AuthError::malformed(format!("duplicate parameter {name}")));
            }

            match tokens.next().transpose()? {
                None => break,
                Some(Token::Comma) => continue,
                Some(_) => return Err(AuthError::malformed("expected ','")),
            }
        }

        let mut take = |name: &str| items.remove(name);
        let required = |value: Option<String>, name: &str| {
            value.ok_or_else(|| AuthError::malformed(format!("missing {name}")))
        };

        let id = required(take("id"), "id")?;
        let ts = required(take("ts"), "ts")?;
        let nonce = required(take("nonce"), "nonce")?;
        let mac = required(take("mac"), "mac")?;
        let ext = take("ext").unwrap_or_default();
        let hash = take("hash");

        let timestamp = ts
            .parse::<i64>()
            .map_err(|_| AuthError::malformed("ts is not an integer"))?;
        let mac = STANDARD
            .decode(mac)
            .map_err(|_| AuthError::malformed("mac is not base64"))?;
        let hash = hash
            .map(|h| STANDARD.decode(h))
            .transpose()
            .map_err(|_| AuthError::malformed("hash is not base64"))?;

        Ok(Self {
            id,
            timestamp,
            nonce,
            ext,
            hash,
            mac,
        })
    }

    /// Serializes into a header value for `scheme`.
    #[must_use]
    pub fn to_header(&self, scheme: &str) -> String {
        let mut out = format!(
            "{scheme} id={}, ts=\"{}\", nonce={}",
            quote(&self.id),
            self.timestamp,
            quote(&self.nonce)
        );
        if let Some(hash) = &self.hash {
            out.push_str(&format!(", hash=\"{}\"", STANDARD.encode(hash)));
        }
        if !self.ext.is_empty() {
            out.push_str(&format!(", ext={}", quote(&self.ext)));
        }
        out.push_str(&format!(", mac=\"{}\"", STANDARD.encode(&self.mac)));
        out
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Quoted(String),
    Equals,
    Comma,
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
        }
    }

    fn quoted(&mut self) -> AuthResult<Token> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(AuthError::malformed("unterminated string")),
                Some('"') => return Ok(Token::Quoted(value)),
                Some('\\') => match self.chars.next() {
                    Some(c @ ('"' | '\\')) => value.push(c),
                    _ => return Err(AuthError::malformed("invalid escape")),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn ident(&mut self, first: char) -> Token {
        let mut name = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Ident(name)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = AuthResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
        let c = self.chars.next()?;
        Some(match c {
            '=' => Ok(Token::Equals),
            ',' => Ok(Token::Comma),
            '"' => self.quoted(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.ident(c)),
            c => Err(AuthError::malformed(format!("unexpected character {c:?}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR: &str = r#"id="dh37fgj492je", ts="1353832234", nonce="j4h3g2", hash="Yi9LfIIFRtBEPt74PVmbTF/xVAwPn7ub15ePICfgnuY=", ext="some-app-ext-data", mac="aSe1DERmZuRl3pI36/9BdZmnErTw3sNzOOAUlfeKjVw=""#;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn parses_reference_header() {
        let params = AuthParameters::parse(VECTOR).unwrap();
        assert_eq!(params.id, "dh37fgj492je");
        assert_eq!(params.timestamp, 1_353_832_234);
        assert_eq!(params.nonce, "j4h3g2");
        assert_eq!(params.ext, "some-app-ext-data");
        assert_eq!(
            hex(params.hash.as_deref().unwrap()),
            "622f4b7c820546d0443edef83d599b4c5ff1540c0f9fbb9bd7978f2027e09ee6"
        );
        assert_eq!(
            hex(&params.mac),
            "6927b50c446666e465de9237ebff417599a712b4f0dec37338e01495f78a8d5c"
        );
    }

    #[test]
    fn scheme_must_match_exactly() {
        let header = format!("hawk {VECTOR}");
        assert_eq!(
            AuthParameters::from_header(&header, "Hawk"),
            Err(AuthError::MalformedHeader)
        );
        assert_eq!(
            AuthParameters::from_header("Hawk", "Hawk"),
            Err(AuthError::MalformedHeader)
        );
        assert!(AuthParameters::from_header(&format!("Hawk {VECTOR}"), "Hawk").is_ok());
    }

    #[test]
    fn optional_parameters_may_be_absent() {
        let params = AuthParameters::parse(r#"id="a", ts="1", nonce="n", mac="AAAA""#).unwrap();
        assert_eq!(params.ext, "");
        assert!(params.hash.is_none());
        assert_eq!(params.mac, vec![0, 0, 0]);
    }

    #[test]
    fn rejects_malformed_lists() {
        let cases = [
            "",
            r#"id="a" ts="1", nonce="n", mac="AAAA""#,
            r#"id=a, ts="1", nonce="n", mac="AAAA""#,
            r#"id="a", ts="1", nonce="n", mac="AAAA","#,
            r#"id="a", ts="x", nonce="n", mac="AAAA""#,
            r#"id="a", ts="1", nonce="n", mac="not base64!""#,
            r#"id="a", ts="1", nonce="n", hash="%%", mac="AAAA""#,
            r#"id="a", ts="1", nonce="n""#,
            r#"id="a", id="b", ts="1", nonce="n", mac="AAAA""#,
            r#"id="a", ts="1", nonce="n", mac="AAAA", app="x""#,
            r#"id="a", ts="1", nonce="n\q", mac="AAAA""#,
            r#"id="a, ts="1""#,
        ];
        for case in cases {
            assert!(
                matches!(
                    AuthParameters::parse(case),
                    Err(AuthError::MalformedParameters(_))
                ),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn escapes_survive_serialization() {
        let params = AuthParameters {
            id: "key".into(),
            timestamp: 42,
            nonce: "n".into(),
            ext: r#"say "hi" \o/"#.into(),
            hash: None,
            mac: vec![1, 2, 3],
        };
        let header = params.to_header("Hawk");
        assert!(header.contains(r#"ext="say \"hi\" \\o/""#));
        assert_eq!(AuthParameters::from_header(&header, "Hawk").unwrap(), params);
    }
}
