//! Minimal XML-RPC codec: enough of the value model to talk to the
//! subtitle service.

use std::collections::BTreeMap;
use std::fmt::Write;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, SubtitleError};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    Struct(BTreeMap<String, Value>),
    Array(Vec<Value>),
    Nil,
}

impl Value {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numbers arrive either as ints or as numeric strings.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(n) => u64::try_from(*n).ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::String(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s.as_str()));
        }
        Value::Int(n) => {
            let _ = write!(out, "<int>{n}</int>");
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::Double(d) => {
            let _ = write!(out, "<double>{d}</double>");
        }
        Value::Nil => out.push_str("<nil/>"),
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name.as_str()));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
    }
    out.push_str("</value>");
}

/// Decodes a `methodResponse`. Faults and malformed documents are
/// protocol errors.
pub fn decode_response(xml: &str) -> Result<Value> {
    let mut parser = Parser {
        tokens: tokenize(xml)?,
        pos: 0,
    };

    parser.expect_open("methodResponse")?;
    if parser.peek_open("fault") {
        parser.expect_open("fault")?;
        let fault = parser.parse_value()?;
        let message = fault
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or("unknown fault")
            .to_string();
        return Err(SubtitleError::Protocol(format!("fault: {message}")));
    }

    parser.expect_open("params")?;
    parser.expect_open("param")?;
    let value = parser.parse_value()?;
    parser.expect_close("param")?;
    parser.expect_close("params")?;
    parser.expect_close("methodResponse")?;
    Ok(value)
}

#[derive(Debug, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Text(String),
}

fn tokenize(xml: &str) -> Result<Vec<Token>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut tokens = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                tokens.push(Token::Open(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
            }
            Ok(Event::End(e)) => {
                tokens.push(Token::Close(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                tokens.push(Token::Open(name.clone()));
                tokens.push(Token::Close(name));
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| SubtitleError::Protocol(e.to_string()))?;
                tokens.push(Token::Text(text.into_owned()));
            }
            Ok(Event::CData(c)) => {
                tokens.push(Token::Text(String::from_utf8_lossy(&c.into_inner()).into_owned()))
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SubtitleError::Protocol(format!("invalid XML: {e}"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Result<&Token> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| SubtitleError::Protocol("unexpected end of document".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn peek_open(&self, name: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Open(n)) if n == name)
    }

    fn peek_close(&self, name: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Close(n)) if n == name)
    }

    fn expect_open(&mut self, name: &str) -> Result<()> {
        match self.next()? {
            Token::Open(n) if n == name => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }

    fn expect_close(&mut self, name: &str) -> Result<()> {
        match self.next()? {
            Token::Close(n) if n == name => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }

    /// Text content of the element whose open tag was just consumed.
    fn text_until_close(&mut self, name: &str) -> Result<String> {
        if self.peek_close(name) {
            self.pos += 1;
            return Ok(String::new());
        }
        let text = match self.next()? {
            Token::Text(t) => t.clone(),
            other => return Err(unexpected("text", other)),
        };
        self.expect_close(name)?;
        Ok(text)
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.expect_open("value")?;

        let tag = match self.next()? {
            Token::Close(n) if n == "value" => return Ok(Value::String(String::new())),
            Token::Text(t) => {
                let text = t.clone();
                self.expect_close("value")?;
                return Ok(Value::String(text));
            }
            Token::Open(tag) => tag.clone(),
            other => return Err(unexpected("value content", other)),
        };

        let value = match tag.as_str() {
            "string" | "dateTime.iso8601" | "base64" => Value::String(self.text_until_close(&tag)?),
            "int" | "i4" | "i8" => {
                let text = self.text_until_close(&tag)?;
                Value::Int(text.trim().parse().map_err(|_| invalid(&tag, &text))?)
            }
            "boolean" => {
                let text = self.text_until_close(&tag)?;
                Value::Bool(text.trim() == "1")
            }
            "double" => {
                let text = self.text_until_close(&tag)?;
                Value::Double(text.trim().parse().map_err(|_| invalid(&tag, &text))?)
            }
            "nil" => {
                self.expect_close("nil")?;
                Value::Nil
            }
            "struct" => {
                let mut members = BTreeMap::new();
                while !self.peek_close("struct") {
                    self.expect_open("member")?;
                    self.expect_open("name")?;
                    let name = self.text_until_close("name")?;
                    let member = self.parse_value()?;
                    self.expect_close("member")?;
                    members.insert(name, member);
                }
                self.expect_close("struct")?;
                Value::Struct(members)
            }
            "array" => {
                let mut items = Vec::new();
                self.expect_open("data")?;
                while !self.peek_close("data") {
                    items.push(self.parse_value()?);
                }
                self.expect_close("data")?;
                self.expect_close("array")?;
                Value::Array(items)
            }
            other => return Err(SubtitleError::Protocol(format!("unsupported type <{other}>"))),
        };

        self.expect_close("value")?;
        Ok(value)
    }
}

fn unexpected(expected: &str, found: &Token) -> SubtitleError {
    SubtitleError::Protocol(format!("expected {expected}, found {found:?}"))
}

fn invalid(tag: &str, text: &str) -> SubtitleError {
    SubtitleError::Protocol(format!("invalid <{tag}> value {text:?}"))
}
