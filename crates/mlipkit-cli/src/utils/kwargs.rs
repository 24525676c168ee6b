use mlipkit::core::kwargs::{Kwargs, Value};

/// Parses a Python-style dict literal into a [`Kwargs`] mapping.
///
/// This is a plain recursive descent parser over the literal grammar
/// (strings, numbers, booleans, `None`, lists, nested dicts); nothing is
/// ever evaluated. A literal that is not a mapping is rejected here, at the
/// argument boundary, so command logic only ever sees well-formed mappings.
pub fn parse_kwargs(input: &str) -> Result<Kwargs, String> {
    let mut parser = Parser::new(input);
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(format!(
            "unexpected trailing characters at position {}",
            parser.pos
        ));
    }
    match value {
        Value::Dict(kwargs) => Ok(kwargs),
        other => Err(format!(
            "must be passed as a dictionary literal, got {}",
            other.type_name()
        )),
    }
}

/// Treats an absent kwargs flag as an empty mapping.
pub fn or_empty(kwargs: Option<Kwargs>) -> Kwargs {
    kwargs.unwrap_or_default()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        match self.bump() {
            Some(found) if found == byte => Ok(()),
            Some(found) => Err(format!(
                "expected '{}' at position {}, found '{}'",
                byte as char,
                self.pos - 1,
                found as char
            )),
            None => Err(format!("expected '{}' but input ended", byte as char)),
        }
    }

    fn parse_value(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.parse_dict(),
            Some(b'[') => self.parse_list(),
            Some(quote @ (b'\'' | b'"')) => self.parse_string(quote).map(Value::Str),
            Some(b'-' | b'+' | b'0'..=b'9') => self.parse_number(),
            Some(byte) if byte.is_ascii_alphabetic() => self.parse_word(),
            Some(byte) => Err(format!(
                "unexpected character '{}' at position {}",
                byte as char, self.pos
            )),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn parse_dict(&mut self) -> Result<Value, String> {
        self.expect(b'{')?;
        let mut entries = Kwargs::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Value::Dict(entries));
            }
            let key = match self.peek() {
                Some(quote @ (b'\'' | b'"')) => self.parse_string(quote)?,
                _ => {
                    return Err(format!(
                        "dictionary keys must be quoted strings (position {})",
                        self.pos
                    ));
                }
            };
            self.skip_whitespace();
            self.expect(b':')?;
            let value = self.parse_value()?;
            // Last assignment wins on key repetition, matching dict literal
            // semantics.
            entries.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b'}') => {}
                _ => {
                    return Err(format!(
                        "expected ',' or '}}' at position {} in dictionary",
                        self.pos
                    ));
                }
            }
        }
    }

    fn parse_list(&mut self) -> Result<Value, String> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b']') {
                self.pos += 1;
                return Ok(Value::List(items));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b']') => {}
                _ => {
                    return Err(format!(
                        "expected ',' or ']' at position {} in list",
                        self.pos
                    ));
                }
            }
        }
    }

    fn parse_string(&mut self, quote: u8) -> Result<String, String> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(byte) if byte == quote => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(escaped @ (b'\\' | b'\'' | b'"')) => out.push(escaped as char),
                    Some(other) => {
                        return Err(format!(
                            "unsupported escape '\\{}' at position {}",
                            other as char,
                            self.pos - 1
                        ));
                    }
                    None => return Err("unterminated escape at end of input".to_string()),
                },
                Some(byte) => {
                    // Multi-byte UTF-8 sequences pass through unchanged.
                    let start = self.pos - 1;
                    let len = utf8_len(byte);
                    if len == 1 {
                        out.push(byte as char);
                    } else {
                        let end = start + len;
                        let slice = self
                            .bytes
                            .get(start..end)
                            .ok_or_else(|| "truncated UTF-8 sequence".to_string())?;
                        let text = std::str::from_utf8(slice)
                            .map_err(|_| "invalid UTF-8 in string literal".to_string())?;
                        out.push_str(text);
                        self.pos = end;
                    }
                }
                None => return Err("unterminated string literal".to_string()),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(byte) = self.peek() {
            match byte {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| "invalid number literal".to_string())?;
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("invalid float literal '{}'", text))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid integer literal '{}'", text))
        }
    }

    fn parse_word(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(byte) if byte.is_ascii_alphanumeric() || byte == b'_') {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| "invalid identifier".to_string())?;
        match word {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" => Ok(Value::None),
            other => Err(format!("unrecognized literal '{}'", other)),
        }
    }
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dict_parses_to_empty_mapping() {
        let kwargs = parse_kwargs("{}").unwrap();
        assert!(kwargs.is_empty());
    }

    #[test]
    fn absent_flag_is_equivalent_to_empty_literal() {
        assert_eq!(or_empty(None), parse_kwargs("{}").unwrap());
    }

    #[test]
    fn present_mapping_passes_through_or_empty_unchanged() {
        let kwargs = parse_kwargs("{'index': 0}").unwrap();
        assert_eq!(or_empty(Some(kwargs.clone())), kwargs);
    }

    #[test]
    fn scalar_value_kinds_are_decoded() {
        let kwargs =
            parse_kwargs("{'a': 1, 'b': -2.5, 'c': True, 'd': false, 'e': None, 'f': 'xyz'}")
                .unwrap();
        assert_eq!(kwargs["a"], Value::Int(1));
        assert_eq!(kwargs["b"], Value::Float(-2.5));
        assert_eq!(kwargs["c"], Value::Bool(true));
        assert_eq!(kwargs["d"], Value::Bool(false));
        assert_eq!(kwargs["e"], Value::None);
        assert_eq!(kwargs["f"], Value::Str("xyz".to_string()));
    }

    #[test]
    fn nested_containers_and_both_quote_styles_parse() {
        let kwargs = parse_kwargs(r#"{'outer': {"inner": [1, 2.0, 'three']}}"#).unwrap();
        let Value::Dict(inner) = &kwargs["outer"] else {
            panic!("expected nested dict");
        };
        let Value::List(items) = &inner["inner"] else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[2], Value::Str("three".to_string()));
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let kwargs = parse_kwargs("{'a': [1, 2,], 'b': 3,}").unwrap();
        assert_eq!(kwargs.len(), 2);
    }

    #[test]
    fn escapes_in_string_literals_are_decoded() {
        let kwargs = parse_kwargs(r#"{'path': 'a\'b', 'tab': "x\ty"}"#).unwrap();
        assert_eq!(kwargs["path"], Value::Str("a'b".to_string()));
        assert_eq!(kwargs["tab"], Value::Str("x\ty".to_string()));
    }

    #[test]
    fn repeated_keys_keep_the_last_value() {
        let kwargs = parse_kwargs("{'a': 1, 'a': 2}").unwrap();
        assert_eq!(kwargs["a"], Value::Int(2));
    }

    #[test]
    fn scientific_notation_is_a_float() {
        let kwargs = parse_kwargs("{'fmax': 1e-3}").unwrap();
        assert_eq!(kwargs["fmax"], Value::Float(1e-3));
    }

    #[test]
    fn non_mapping_literals_are_rejected_with_a_dictionary_error() {
        for literal in ["[1, 2]", "42", "'text'", "True", "None"] {
            let err = parse_kwargs(literal).unwrap_err();
            assert!(
                err.contains("dictionary"),
                "error for {literal:?} should mention dictionaries: {err}"
            );
        }
    }

    #[test]
    fn malformed_literals_are_rejected() {
        assert!(parse_kwargs("{'a': }").is_err());
        assert!(parse_kwargs("{'a' 1}").is_err());
        assert!(parse_kwargs("{'a': 1").is_err());
        assert!(parse_kwargs("{1: 'a'}").is_err());
        assert!(parse_kwargs("{'a': 'unterminated}").is_err());
        assert!(parse_kwargs("{} extra").is_err());
    }

    #[test]
    fn code_like_input_is_not_evaluated() {
        assert!(parse_kwargs("{'a': __import__('os')}").is_err());
        assert!(parse_kwargs("{'a': 1 + 1}").is_err());
    }
}
