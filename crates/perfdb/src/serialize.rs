//! Field-oriented wire codec for values stored in the database.
//!
//! A payload is the comma-joined encoding of a struct's fields. Field order
//! is the wire contract; the names handed to the visitor are diagnostics
//! only. Encoded fields never contain a record delimiter.

/// Characters reserved by the record grammar.
pub const DELIMITERS: [char; 4] = [',', ';', '=', ':'];

/// Returns true when `text` is free of record delimiters.
pub fn is_clean_text(text: &str) -> bool {
    !text.contains(DELIMITERS)
}

/// A scalar that can act as one wire field.
pub trait WireField {
    fn encode_field(&self) -> String;

    /// Parses `text` into `self`. Returns false on malformed input and
    /// leaves `self` untouched.
    fn decode_field(&mut self, text: &str) -> bool;
}

macro_rules! int_wire_field {
    ($($ty:ty),* $(,)?) => {$(
        impl WireField for $ty {
            fn encode_field(&self) -> String {
                self.to_string()
            }

            fn decode_field(&mut self, text: &str) -> bool {
                match text.trim().parse() {
                    Ok(value) => {
                        *self = value;
                        true
                    }
                    Err(_) => false,
                }
            }
        }
    )*};
}

int_wire_field!(i32, i64, u32, u64, usize);

impl WireField for bool {
    fn encode_field(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }

    fn decode_field(&mut self, text: &str) -> bool {
        match text.trim() {
            "0" => {
                *self = false;
                true
            }
            "1" => {
                *self = true;
                true
            }
            _ => false,
        }
    }
}

/// Receives the fields of a serializable struct, in wire order.
pub trait FieldVisitor {
    fn field(&mut self, value: &mut dyn WireField, name: &'static str);
}

/// Implemented by every struct persisted through the codec.
///
/// `visit` must enumerate the same fields in the same order on every call;
/// that order is the wire format.
pub trait TuningFields {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor);
}

impl TuningFields for i32 {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor) {
        visitor.field(self, "value");
    }
}

struct Encoder {
    parts: Vec<String>,
}

impl FieldVisitor for Encoder {
    fn field(&mut self, value: &mut dyn WireField, _name: &'static str) {
        let part = value.encode_field();
        debug_assert!(is_clean_text(&part), "encoded field contains a delimiter");
        self.parts.push(part);
    }
}

struct Decoder<'a> {
    parts: Vec<&'a str>,
    next: usize,
    ok: bool,
}

impl FieldVisitor for Decoder<'_> {
    fn field(&mut self, value: &mut dyn WireField, _name: &'static str) {
        if !self.ok {
            return;
        }
        match self.parts.get(self.next) {
            Some(part) if value.decode_field(part) => self.next += 1,
            _ => self.ok = false,
        }
    }
}

/// Encodes `value` as a comma-joined payload.
pub fn serialize_values<T: TuningFields + Clone>(value: &T) -> String {
    let mut encoder = Encoder { parts: Vec::new() };
    value.clone().visit(&mut encoder);
    encoder.parts.join(",")
}

/// Decodes `text` into `target`. Returns false without touching `target`
/// when any field fails to parse or trailing fields remain.
pub fn deserialize_values<T: TuningFields + Clone>(target: &mut T, text: &str) -> bool {
    let mut scratch = target.clone();
    let mut decoder = Decoder {
        parts: text.split(',').collect(),
        next: 0,
        ok: true,
    };
    scratch.visit(&mut decoder);
    if decoder.ok && decoder.next == decoder.parts.len() {
        *target = scratch;
        true
    } else {
        false
    }
}
