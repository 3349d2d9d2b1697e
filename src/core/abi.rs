//! Solidity ABI codec.
//!
//! Covers what the marketplace contracts expose: unsigned and signed
//! integers (carried as 128-bit values), `address`, `bool`, fixed-size
//! `bytesN`, the dynamic `string` / `bytes` types, and arrays (`T[]`,
//! `T[k]`) and tuples built from them.

use crate::domain::model::Address;
use crate::utils::error::{MarketError, Result};
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint(usize),
    Int(usize),
    Address,
    Bool,
    FixedBytes(usize),
    String,
    Bytes,
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
    Tuple(Vec<ParamType>),
}

impl ParamType {
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::String | ParamType::Bytes | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(items) => items.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    /// Bytes this type takes in the head of an enclosing encoding.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return WORD;
        }
        match self {
            ParamType::FixedArray(inner, len) => inner.head_size().saturating_mul(*len),
            ParamType::Tuple(items) => items.iter().map(ParamType::head_size).sum(),
            _ => WORD,
        }
    }
}

/// Splits `a,(b,c),d[]` on the commas that are not nested in parentheses.
fn split_components(s: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| MarketError::abi(format!("unbalanced tuple type ({})", s)))?;
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(MarketError::abi(format!("unbalanced tuple type ({})", s)));
    }
    if !s.is_empty() {
        parts.push(&s[start..]);
    }
    Ok(parts)
}

impl FromStr for ParamType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        let bits = |digits: &str| -> Result<usize> {
            if digits.is_empty() {
                return Ok(256);
            }
            match digits.parse::<usize>() {
                Ok(n) if n > 0 && n <= 256 && n % 8 == 0 => Ok(n),
                _ => Err(MarketError::abi(format!("invalid integer width in {}", s))),
            }
        };

        // 最外層的維度在最右邊：uint8[2][] 是 (uint8[2])[]
        if let Some(rest) = s.strip_suffix(']') {
            let open = rest
                .rfind('[')
                .ok_or_else(|| MarketError::abi(format!("malformed array type {}", s)))?;
            let inner = Box::new(rest[..open].parse::<ParamType>()?);
            let dimension = &rest[open + 1..];
            if dimension.is_empty() {
                return Ok(ParamType::Array(inner));
            }
            return dimension
                .parse::<usize>()
                .map(|len| ParamType::FixedArray(inner, len))
                .map_err(|_| MarketError::abi(format!("invalid array length in {}", s)));
        }

        if let Some(body) = s.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            return split_components(body)?
                .into_iter()
                .map(str::parse::<ParamType>)
                .collect::<Result<Vec<_>>>()
                .map(ParamType::Tuple);
        }

        match s {
            "address" => Ok(ParamType::Address),
            "bool" => Ok(ParamType::Bool),
            "string" => Ok(ParamType::String),
            "bytes" => Ok(ParamType::Bytes),
            _ => {
                if let Some(rest) = s.strip_prefix("uint") {
                    Ok(ParamType::Uint(bits(rest)?))
                } else if let Some(rest) = s.strip_prefix("int") {
                    Ok(ParamType::Int(bits(rest)?))
                } else if let Some(rest) = s.strip_prefix("bytes") {
                    match rest.parse::<usize>() {
                        Ok(n) if (1..=32).contains(&n) => Ok(ParamType::FixedBytes(n)),
                        _ => Err(MarketError::abi(format!("invalid bytes width in {}", s))),
                    }
                } else {
                    Err(MarketError::abi(format!("unknown ABI type {}", s)))
                }
            }
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Uint(bits) => write!(f, "uint{}", bits),
            ParamType::Int(bits) => write!(f, "int{}", bits),
            ParamType::Address => f.write_str("address"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::FixedBytes(n) => write!(f, "bytes{}", n),
            ParamType::String => f.write_str("string"),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::Array(inner) => write!(f, "{}[]", inner),
            ParamType::FixedArray(inner, len) => write!(f, "{}[{}]", inner, len),
            ParamType::Tuple(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", items.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u128),
    Int(i128),
    Address(Address),
    Bool(bool),
    FixedBytes(Vec<u8>),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Token>),
    FixedArray(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    pub fn matches(&self, param: &ParamType) -> bool {
        match (self, param) {
            (Token::Uint(_), ParamType::Uint(_))
            | (Token::Int(_), ParamType::Int(_))
            | (Token::Address(_), ParamType::Address)
            | (Token::Bool(_), ParamType::Bool)
            | (Token::String(_), ParamType::String)
            | (Token::Bytes(_), ParamType::Bytes) => true,
            (Token::FixedBytes(bytes), ParamType::FixedBytes(n)) => bytes.len() <= *n,
            (Token::Array(items), ParamType::Array(inner)) => {
                items.iter().all(|item| item.matches(inner))
            }
            (Token::FixedArray(items), ParamType::FixedArray(inner, len)) => {
                items.len() == *len && items.iter().all(|item| item.matches(inner))
            }
            (Token::Tuple(items), ParamType::Tuple(params)) => {
                items.len() == params.len()
                    && items.iter().zip(params).all(|(item, param)| item.matches(param))
            }
            _ => false,
        }
    }

    fn is_dynamic(&self) -> bool {
        match self {
            Token::String(_) | Token::Bytes(_) | Token::Array(_) => true,
            Token::FixedArray(items) | Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    pub fn into_uint(self) -> Option<u128> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(a),
            _ => None,
        }
    }
}

/// First four bytes of the Keccak-256 hash of a canonical function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector([u8; 4]);

impl Selector {
    pub fn from_signature(signature: &str) -> Self {
        let hash = Keccak256::digest(signature.as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        Self(selector)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn int_word(value: i128) -> [u8; WORD] {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = [fill; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

fn length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD + padded_len(data.len()));
    out.extend_from_slice(&uint_word(data.len() as u128));
    out.extend_from_slice(data);
    out.resize(WORD + padded_len(data.len()), 0);
    out
}

/// Encoding of a single value: the head word for static scalars, the
/// tail body for dynamic values, the packed members for static composites.
fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(v) => uint_word(*v).to_vec(),
        Token::Int(v) => int_word(*v).to_vec(),
        Token::Address(a) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(a.as_bytes());
            word.to_vec()
        }
        Token::Bool(b) => uint_word(u128::from(*b)).to_vec(),
        Token::FixedBytes(bytes) => {
            let mut word = [0u8; WORD];
            let len = bytes.len().min(WORD);
            word[..len].copy_from_slice(&bytes[..len]);
            word.to_vec()
        }
        Token::String(s) => length_prefixed(s.as_bytes()),
        Token::Bytes(b) => length_prefixed(b),
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u128).to_vec();
            out.extend_from_slice(&encode(items));
            out
        }
        Token::FixedArray(items) | Token::Tuple(items) => encode(items),
    }
}

/// Head/tail encoding of a parameter list.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let bodies: Vec<(bool, Vec<u8>)> = tokens
        .iter()
        .map(|token| (token.is_dynamic(), encode_token(token)))
        .collect();
    let head_len: usize = bodies
        .iter()
        .map(|(dynamic, body)| if *dynamic { WORD } else { body.len() })
        .sum();

    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (dynamic, body) in bodies {
        if dynamic {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            tail.extend_from_slice(&body);
        } else {
            head.extend_from_slice(&body);
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| MarketError::abi(format!("data too short to read word at {}", offset)))
}

fn word_to_usize(word: &[u8]) -> Result<usize> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(MarketError::abi("offset or length out of range"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| MarketError::abi("offset or length out of range"))
}

fn tail_from(data: &[u8], offset: usize) -> Result<&[u8]> {
    data.get(offset..)
        .ok_or_else(|| MarketError::abi(format!("offset {} points past end of data", offset)))
}

fn decode_scalar(param: &ParamType, word: &[u8]) -> Result<Token> {
    match param {
        ParamType::Uint(_) => {
            if word[..16].iter().any(|b| *b != 0) {
                return Err(MarketError::abi("uint value does not fit in 128 bits"));
            }
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&word[16..]);
            Ok(Token::Uint(u128::from_be_bytes(buf)))
        }
        ParamType::Int(_) => {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&word[16..]);
            let value = i128::from_be_bytes(buf);
            let fill = if value < 0 { 0xff } else { 0x00 };
            if word[..16].iter().any(|b| *b != fill) {
                return Err(MarketError::abi("int value does not fit in 128 bits"));
            }
            Ok(Token::Int(value))
        }
        ParamType::Address => {
            let mut buf = [0u8; 20];
            buf.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address::new(buf)))
        }
        ParamType::Bool => match word_to_usize(word)? {
            0 => Ok(Token::Bool(false)),
            1 => Ok(Token::Bool(true)),
            other => Err(MarketError::abi(format!("invalid bool value {}", other))),
        },
        ParamType::FixedBytes(n) => Ok(Token::FixedBytes(word[..*n].to_vec())),
        other => Err(MarketError::abi(format!("{} is not a single-word type", other))),
    }
}

/// Decodes a value whose encoding starts at the beginning of `data`.
fn decode_body(param: &ParamType, data: &[u8]) -> Result<Token> {
    match param {
        ParamType::String | ParamType::Bytes => {
            let len = word_to_usize(word_at(data, 0)?)?;
            let bytes = WORD
                .checked_add(len)
                .and_then(|end| data.get(WORD..end))
                .ok_or_else(|| MarketError::abi("dynamic value runs past end of data"))?
                .to_vec();
            if *param == ParamType::String {
                String::from_utf8(bytes)
                    .map(Token::String)
                    .map_err(|e| MarketError::abi(format!("string is not valid UTF-8: {}", e)))
            } else {
                Ok(Token::Bytes(bytes))
            }
        }
        ParamType::Array(inner) => {
            let len = word_to_usize(word_at(data, 0)?)?;
            let items = &data[WORD..];
            // 每個元素在 head 至少佔一個 word
            if len > items.len() / WORD {
                return Err(MarketError::abi(format!(
                    "array length {} runs past end of data",
                    len
                )));
            }
            decode_sequence(std::iter::repeat(inner.as_ref()).take(len), items).map(Token::Array)
        }
        ParamType::FixedArray(inner, len) => {
            decode_sequence(std::iter::repeat(inner.as_ref()).take(*len), data)
                .map(Token::FixedArray)
        }
        ParamType::Tuple(items) => decode_sequence(items.iter(), data).map(Token::Tuple),
        scalar => decode_scalar(scalar, word_at(data, 0)?),
    }
}

/// Walks the heads of a parameter list; dynamic members are followed
/// through their offset, which is relative to the start of `data`.
fn decode_sequence<'a>(
    params: impl Iterator<Item = &'a ParamType>,
    data: &[u8],
) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut head = 0usize;

    for param in params {
        let token = if param.is_dynamic() {
            let offset = word_to_usize(word_at(data, head)?)?;
            decode_body(param, tail_from(data, offset)?)?
        } else {
            decode_body(param, tail_from(data, head)?)?
        };
        tokens.push(token);
        head = head
            .checked_add(param.head_size())
            .ok_or_else(|| MarketError::abi("head size out of range"))?;
    }

    Ok(tokens)
}

pub fn decode(params: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    if !params.is_empty() && data.is_empty() {
        // eth_call 對沒有程式碼的地址會回傳 0x
        return Err(MarketError::abi(
            "empty call result, no contract code at this address?",
        ));
    }

    decode_sequence(params.iter(), data)
}

fn check_args(label: &str, params: &[ParamType], args: &[Token]) -> Result<()> {
    if args.len() != params.len() {
        return Err(MarketError::abi(format!(
            "{} expects {} arguments, got {}",
            label,
            params.len(),
            args.len()
        )));
    }

    for (i, (arg, param)) in args.iter().zip(params).enumerate() {
        if !arg.matches(param) {
            return Err(MarketError::abi(format!(
                "argument {} of {} must be {}, got {:?}",
                i, label, param, arg
            )));
        }
    }
    Ok(())
}

/// `bytes32` 字串轉 UTF-8，去掉尾端補零
pub fn bytes32_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Members of a `tuple` / `tuple[]` parameter.
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    pub fn param_type(&self) -> Result<ParamType> {
        match self.kind.strip_prefix("tuple") {
            Some(dimensions) => {
                let members = self
                    .components
                    .iter()
                    .map(|c| c.param_type().map(|t| t.to_string()))
                    .collect::<Result<Vec<_>>>()?;
                format!("({}){}", members.join(","), dimensions).parse()
            }
            None => self.kind.parse(),
        }
    }
}

fn param_types(params: &[AbiParam]) -> Result<Vec<ParamType>> {
    params.iter().map(AbiParam::param_type).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub constant: Option<bool>,
    #[serde(default)]
    pub state_mutability: Option<String>,
}

fn default_entry_type() -> String {
    "function".to_string()
}

/// A resolved contract function: name plus parsed input and output types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
    pub read_only: bool,
}

impl Function {
    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(ToString::to_string).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    pub fn selector(&self) -> Selector {
        Selector::from_signature(&self.signature())
    }

    pub fn encode_input(&self, args: &[Token]) -> Result<Vec<u8>> {
        check_args(&self.signature(), &self.inputs, args)?;

        let mut data = self.selector().as_bytes().to_vec();
        data.extend_from_slice(&encode(args));
        Ok(data)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>> {
        decode(&self.outputs, data)
    }
}

impl TryFrom<&AbiEntry> for Function {
    type Error = MarketError;

    fn try_from(entry: &AbiEntry) -> Result<Self> {
        let name = entry
            .name
            .clone()
            .ok_or_else(|| MarketError::abi("function entry without a name"))?;
        let read_only = entry.constant.unwrap_or(false)
            || matches!(entry.state_mutability.as_deref(), Some("view") | Some("pure"));

        Ok(Function {
            name,
            inputs: param_types(&entry.inputs)?,
            outputs: param_types(&entry.outputs)?,
            read_only,
        })
    }
}

/// Contract interface as found in a compiled artifact.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Abi {
    pub entries: Vec<AbiEntry>,
}

impl Abi {
    /// Looks up a function by name and arity, so overloads resolve by
    /// argument count.
    pub fn function(&self, name: &str, arity: usize) -> Result<Function> {
        let mut found_name = false;
        for entry in &self.entries {
            if entry.kind != "function" || entry.name.as_deref() != Some(name) {
                continue;
            }
            found_name = true;
            if entry.inputs.len() == arity {
                return Function::try_from(entry);
            }
        }

        if found_name {
            Err(MarketError::abi(format!(
                "no overload of {} takes {} arguments",
                name, arity
            )))
        } else {
            Err(MarketError::abi(format!("function {} not found in ABI", name)))
        }
    }

    /// Constructor inputs; a contract without a constructor entry takes none.
    pub fn constructor_inputs(&self) -> Result<Vec<ParamType>> {
        match self.entries.iter().find(|e| e.kind == "constructor") {
            Some(entry) => param_types(&entry.inputs),
            None => Ok(Vec::new()),
        }
    }

    /// Constructor arguments as appended to the creation bytecode (no selector).
    pub fn encode_constructor(&self, args: &[Token]) -> Result<Vec<u8>> {
        check_args("constructor", &self.constructor_inputs()?, args)?;
        Ok(encode(args))
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.kind == "function")
            .filter_map(|e| e.name.as_deref())
    }
}
