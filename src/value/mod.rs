use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::{CalcError, CalcResult};
use crate::host::ObjectRef;
use crate::locale::LocaleConfig;

/// Day zero of the date serial scheme (OLE automation dates).
fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[derive(Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDateTime),
    Null,
    List(Vec<Value>),
    Object(ObjectRef),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Numeric coercion: booleans map to 0/1, null to 0, text is parsed with
    /// a plain `.` decimal point. Use [`Value::to_number_with`] when the text
    /// may carry a localized decimal separator.
    pub fn to_number(&self) -> CalcResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Ok(0.0),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CalcError::eval(format!("cannot convert '{s}' to a number"))),
            Value::Date(d) => Ok(date_to_serial(*d)),
            other => Err(CalcError::eval(format!(
                "cannot convert {} to a number",
                other.kind_name()
            ))),
        }
    }

    pub fn to_number_with(&self, locale: &LocaleConfig) -> CalcResult<f64> {
        match self {
            Value::Text(s) => locale
                .parse_number(s.trim())
                .ok_or_else(|| CalcError::eval(format!("cannot convert '{s}' to a number"))),
            other => other.to_number(),
        }
    }

    pub fn to_bool(&self) -> CalcResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Null => Ok(false),
            Value::Text(s) => {
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    match s.trim().parse::<f64>() {
                        Ok(n) => Ok(n != 0.0),
                        Err(_) => Err(CalcError::eval(format!(
                            "cannot convert '{s}' to a boolean"
                        ))),
                    }
                }
            }
            other => Err(CalcError::eval(format!(
                "cannot convert {} to a boolean",
                other.kind_name()
            ))),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn to_datetime(&self, locale: &LocaleConfig) -> CalcResult<NaiveDateTime> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Number(n) => Ok(serial_to_date(*n)),
            Value::Text(s) => locale
                .parse_date(s)
                .ok_or_else(|| CalcError::eval(format!("cannot convert '{s}' to a date"))),
            other => Err(CalcError::eval(format!(
                "cannot convert {} to a date",
                other.kind_name()
            ))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Ordering used by the comparison operators. The right operand is always
    /// coerced to the left operand's kind; `1 = "1"` is true while
    /// `"1" = 1` compares as text against `"1"` (also true), but
    /// `"01" = 1` and `1 = "01"` differ. Null sorts below everything.
    pub fn compare(&self, other: &Value, locale: &LocaleConfig) -> CalcResult<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::Number(a), _) => Ok(a.total_cmp(&other.to_number_with(locale)?)),
            (Value::Date(a), _) => Ok(a.cmp(&other.to_datetime(locale)?)),
            (Value::Bool(a), _) => Ok(a.cmp(&other.to_bool()?)),
            (Value::Text(a), _) => Ok(a.as_str().cmp(other.to_text().as_str())),
            (left, _) => Err(CalcError::eval(format!(
                "cannot compare {} values",
                left.kind_name()
            ))),
        }
    }

    /// Value equality as used by change propagation: structural for scalars
    /// and lists, reference identity for objects.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_same(y))
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Days (with fraction) since 1899-12-30.
pub fn date_to_serial(d: NaiveDateTime) -> f64 {
    let delta = d - serial_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

pub fn serial_to_date(serial: f64) -> NaiveDateTime {
    serial_epoch() + Duration::milliseconds((serial * 86_400_000.0).round() as i64)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Date(d) => write!(f, "Date({d})"),
            Value::Null => f.write_str("Null"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Object(o) => write!(f, "Object(<{}>)", o.borrow().type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::Null => Ok(()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(o) => write!(f, "<{}>", o.borrow().type_name()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercions() {
        assert_eq!(Value::Bool(true).to_number().unwrap(), 1.0);
        assert_eq!(Value::Null.to_number().unwrap(), 0.0);
        assert_eq!(Value::Text(" 2.5 ".into()).to_number().unwrap(), 2.5);
        assert!(Value::Text("x".into()).to_number().is_err());
    }

    #[test]
    fn right_operand_follows_left_kind() {
        let locale = LocaleConfig::en_us();
        let n = Value::Number(1.0);
        let t = Value::Text("1".into());
        assert_eq!(n.compare(&t, &locale).unwrap(), Ordering::Equal);
        assert_eq!(t.compare(&n, &locale).unwrap(), Ordering::Equal);
        // Coercion direction shows once the texts stop matching literally.
        let padded = Value::Text("01".into());
        assert_eq!(n.compare(&padded, &locale).unwrap(), Ordering::Equal);
        assert_ne!(padded.compare(&n, &locale).unwrap(), Ordering::Equal);
    }

    #[test]
    fn serial_round_trip() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let serial = date_to_serial(d);
        assert_eq!(serial_to_date(serial), d);
        assert_eq!(serial.fract(), 0.25);
    }

    #[test]
    fn null_sorts_first() {
        let locale = LocaleConfig::en_us();
        assert_eq!(
            Value::Null.compare(&Value::Number(0.0), &locale).unwrap(),
            Ordering::Less
        );
    }
}
