//! printf-style counter formats.
//!
//! A counter format holds literal text around exactly one signed integer
//! conversion: `%[flags][width][.precision][length](d|i)` with flags from
//! `-+ #0` and an optional length modifier (`l`, `ll`, `I64`, `q` or `j`).
//! `%%` is a literal percent sign.

use super::BookError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// A validated counter format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterFormat {
    prefix: String,
    spec: Spec,
    suffix: String,
}

const LENGTH_MODIFIERS: [&str; 5] = ["ll", "l", "I64", "q", "j"];

fn read_number(chars: &[char], pos: &mut usize) -> Option<usize> {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if start == *pos {
        return None;
    }
    chars[start..*pos].iter().collect::<String>().parse().ok()
}

impl CounterFormat {
    pub fn parse(format: &str) -> Result<Self, BookError> {
        let chars: Vec<char> = format.chars().collect();
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec = None;
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            pos += 1;
            if c != '%' {
                if spec.is_some() { suffix.push(c) } else { prefix.push(c) }
                continue;
            }
            match chars.get(pos) {
                None => return Err(BookError::invalid_format(format, "ends inside a conversion")),
                Some('%') => {
                    pos += 1;
                    if spec.is_some() { suffix.push('%') } else { prefix.push('%') }
                    continue;
                }
                Some(_) => {}
            }
            if spec.is_some() {
                return Err(BookError::invalid_format(format, "more than one conversion"));
            }

            let mut parsed = Spec::default();
            while let Some(flag) = chars.get(pos) {
                match flag {
                    '-' => parsed.left = true,
                    '+' => parsed.plus = true,
                    ' ' => parsed.space = true,
                    '0' => parsed.zero = true,
                    '#' => {}
                    _ => break,
                }
                pos += 1;
            }
            parsed.width = read_number(&chars, &mut pos);
            if chars.get(pos) == Some(&'.') {
                pos += 1;
                parsed.precision = Some(read_number(&chars, &mut pos).unwrap_or(0));
            }
            let rest: String = chars[pos..].iter().collect();
            if let Some(modifier) = LENGTH_MODIFIERS.iter().find(|m| rest.starts_with(*m)) {
                pos += modifier.chars().count();
            }
            match chars.get(pos) {
                Some('d') | Some('i') => pos += 1,
                Some(other) => {
                    return Err(BookError::invalid_format(
                        format,
                        format!("unsupported conversion '{other}'"),
                    ));
                }
                None => return Err(BookError::invalid_format(format, "ends inside a conversion")),
            }
            spec = Some(parsed);
        }

        let spec = spec.ok_or_else(|| BookError::invalid_format(format, "no integer conversion"))?;
        Ok(Self {
            prefix,
            spec,
            suffix,
        })
    }

    /// Renders `value` the way C `printf` renders it with this format.
    pub fn format(&self, value: i64) -> String {
        let spec = &self.spec;
        let mut digits = value.unsigned_abs().to_string();
        if let Some(precision) = spec.precision {
            if precision == 0 && value == 0 {
                digits.clear();
            } else if digits.len() < precision {
                digits = format!("{}{digits}", "0".repeat(precision - digits.len()));
            }
        }
        let sign = if value < 0 {
            "-"
        } else if spec.plus {
            "+"
        } else if spec.space {
            " "
        } else {
            ""
        };

        let len = sign.len() + digits.len();
        let body = match spec.width {
            Some(width) if width > len => {
                let pad = width - len;
                if spec.left {
                    format!("{sign}{digits}{}", " ".repeat(pad))
                } else if spec.zero && spec.precision.is_none() {
                    format!("{sign}{}{digits}", "0".repeat(pad))
                } else {
                    format!("{}{sign}{digits}", " ".repeat(pad))
                }
            }
            _ => format!("{sign}{digits}"),
        };
        format!("{}{body}{}", self.prefix, self.suffix)
    }
}

/// Checks that `format` is a usable counter format.
pub fn validate_counter_format(format: &str) -> Result<(), BookError> {
    CounterFormat::parse(format).map(|_| ())
}
