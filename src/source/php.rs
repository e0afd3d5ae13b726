//! PHP `serialize()` format
//!
//! Settings sources written in PHP are dumped remotely with `serialize()` and
//! decoded here; settings written back are encoded the same way and handed to
//! `unserialize()` inside the generated script.
//!
//! PHP arrays are ordered maps, so every array decodes to a JSON object with
//! string keys (`a:1:{i:0;...}` becomes `{"0": ...}`). Objects and references
//! are rejected.

use serde_json::{Map, Number, Value};

use crate::error::{DbDeployError, Result};

/// Deepest array nesting accepted when decoding
const MAX_DEPTH: usize = 64;

/// Decode a PHP-serialized value
pub fn unserialize(input: &str) -> Result<Value> {
    let mut parser = Parser { input: input.as_bytes(), pos: 0, depth: 0 };
    let value = parser.value()?;
    if parser.pos != parser.input.len() {
        return Err(parser.error("trailing data"));
    }
    Ok(value)
}

/// Encode a value in PHP's serialization format
#[must_use]
pub fn serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Escape text for a PHP single-quoted string literal (quotes not included)
#[must_use]
pub fn single_quote(text: &str) -> String {
    text.replace('\\', r"\\").replace('\'', r"\'")
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                out.push_str(&format!("i:{n};"));
            } else {
                out.push_str(&format!("d:{};", n.as_f64().unwrap_or_default()));
            }
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push_str(&format!("a:{}:{{", items.len()));
            for (idx, item) in items.iter().enumerate() {
                out.push_str(&format!("i:{idx};"));
                write_value(out, item);
            }
            out.push('}');
        }
        Value::Object(map) => {
            out.push_str(&format!("a:{}:{{", map.len()));
            for (key, item) in map {
                write_string(out, key);
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    // length is in bytes
    out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, detail: &str) -> DbDeployError {
        DbDeployError::serialization(format!(
            "Invalid PHP serialized data at byte {}: {detail}",
            self.pos
        ))
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.input.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    /// Consume up to (not including) `delim`, then skip `delim`
    fn until(&mut self, delim: u8) -> Result<&'a str> {
        let input = self.input;
        let start = self.pos;
        let len = input[start..]
            .iter()
            .position(|&b| b == delim)
            .ok_or_else(|| self.error(&format!("missing '{}'", delim as char)))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&input[start..start + len]).map_err(|_| self.error("invalid UTF-8"))
    }

    fn tag(&mut self) -> Result<u8> {
        let tag = *self.input.get(self.pos).ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(tag)
    }

    fn integer(&mut self) -> Result<i64> {
        let text = self.until(b';')?;
        text.parse::<i64>().map_err(|_| self.error(&format!("invalid integer '{text}'")))
    }

    fn length(&mut self) -> Result<usize> {
        let text = self.until(b':')?;
        text.parse::<usize>().map_err(|_| self.error(&format!("invalid length '{text}'")))
    }

    fn string_body(&mut self) -> Result<String> {
        let len = self.length()?;
        self.expect(b'"')?;
        let input = self.input;
        let end =
            self.pos.checked_add(len).ok_or_else(|| self.error("string overruns input"))?;
        let bytes = input.get(self.pos..end).ok_or_else(|| self.error("string overruns input"))?;
        let text = std::str::from_utf8(bytes).map_err(|_| self.error("invalid UTF-8"))?.to_string();
        self.pos = end;
        self.expect(b'"')?;
        self.expect(b';')?;
        Ok(text)
    }

    fn value(&mut self) -> Result<Value> {
        let tag = self.tag()?;
        if tag == b'N' {
            self.expect(b';')?;
            return Ok(Value::Null);
        }
        self.expect(b':')?;
        match tag {
            b'b' => Ok(Value::Bool(self.integer()? != 0)),
            b'i' => Ok(Value::Number(self.integer()?.into())),
            b'd' => {
                let text = self.until(b';')?;
                // no JSON form
                if matches!(text, "NAN" | "INF" | "-INF") {
                    return Ok(Value::Null);
                }
                let float = text
                    .parse::<f64>()
                    .map_err(|_| self.error(&format!("invalid float '{text}'")))?;
                Ok(Number::from_f64(float).map_or(Value::Null, Value::Number))
            }
            b's' => Ok(Value::String(self.string_body()?)),
            b'a' => {
                if self.depth >= MAX_DEPTH {
                    return Err(self.error("arrays nested too deeply"));
                }
                let count = self.length()?;
                self.expect(b'{')?;
                self.depth += 1;
                let mut map = Map::new();
                for _ in 0..count {
                    let key = self.key()?;
                    let value = self.value()?;
                    map.insert(key, value);
                }
                self.depth -= 1;
                self.expect(b'}')?;
                Ok(Value::Object(map))
            }
            other => Err(self.error(&format!("unsupported type '{}'", other as char))),
        }
    }

    fn key(&mut self) -> Result<String> {
        let tag = self.tag()?;
        self.expect(b':')?;
        match tag {
            b'i' => Ok(self.integer()?.to_string()),
            b's' => self.string_body(),
            other => Err(self.error(&format!("unsupported array key type '{}'", other as char))),
        }
    }
}
