// SPDX-License-Identifier: MIT OR Apache-2.0

//! Printf-style message templates.
//!
//! A log call carries a template such as `"took %d ms for %s"` and a list of [`Arg`]s.
//! Nothing is formatted at capture time; [`render`] runs the first time a handler asks
//! for the message.
//!
//! Supported directives: `%s`, `%d`/`%i`, `%u`, `%x`/`%X`, `%o`, `%f` (with optional
//! precision such as `%.2f`), `%e`, `%b`, `%c`, `%n` (newline) and `%%`.
//! A width pads to at least that many characters (`%5d`); the `-` flag left-aligns and
//! the `0` flag zero-pads numbers (`%-10s`, `%05d`).
//! A directive with no argument left is written out verbatim. Arguments left over after
//! the template is exhausted are appended in brackets so they are never lost.

use std::fmt::{Display, Write};
use std::sync::Arc;

/// One argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(Arc<str>),
}

impl Arg {
    /// Captures anything `Display` as a string argument.
    pub fn display(value: impl Display) -> Self {
        Arg::Str(value.to_string().into())
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Arg::Int(v) => Some(*v as i128),
            Arg::UInt(v) => Some(*v as i128),
            Arg::Bool(b) => Some(*b as i128),
            Arg::Char(c) => Some(*c as i128),
            Arg::Float(_) | Arg::Str(_) => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Int(v) => Some(*v as f64),
            Arg::UInt(v) => Some(*v as f64),
            Arg::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Arg::Bool(b) => *b,
            Arg::Int(v) => *v != 0,
            Arg::UInt(v) => *v != 0,
            Arg::Float(v) => *v != 0.0,
            Arg::Char(_) => true,
            Arg::Str(s) => !s.is_empty(),
        }
    }
}

impl Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Int(v) => write!(f, "{v}"),
            Arg::UInt(v) => write!(f, "{v}"),
            Arg::Float(v) => write!(f, "{v}"),
            Arg::Bool(v) => write!(f, "{v}"),
            Arg::Char(v) => write!(f, "{v}"),
            Arg::Str(v) => f.write_str(v),
        }
    }
}

macro_rules! arg_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::$variant(value as $target)
            }
        })*
    };
}

arg_from!(Int as i64: i8, i16, i32, i64, isize);
arg_from!(UInt as u64: u8, u16, u32, u64, usize);
arg_from!(Float as f64: f32, f64);

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<char> for Arg {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.into())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value.into())
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.as_str().into())
    }
}

impl From<Arc<str>> for Arg {
    fn from(value: Arc<str>) -> Self {
        Arg::Str(value)
    }
}

/// Applies `args` to `template`.
///
/// ```
/// use logroute::template::{render, Arg};
///
/// assert_eq!(render("x=%d", &[Arg::from(5)]), "x=5");
/// assert_eq!(render("%.2f%%", &[Arg::from(99.5)]), "99.50%");
/// ```
pub fn render(template: &str, args: &[Arg]) -> String {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut args = args.iter();
    let mut chars = template.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut opts = Padding::default();
        while let Some(&(_, flag @ ('-' | '0'))) = chars.peek() {
            match flag {
                '-' => opts.left = true,
                _ => opts.zero = true,
            }
            chars.next();
        }
        opts.width = take_number(&mut chars);
        if let Some(&(_, '.')) = chars.peek() {
            chars.next();
            opts.precision = take_number(&mut chars);
        }

        let Some((end, conv)) = chars.next() else {
            // trailing '%', or '%.' with nothing after it
            out.push_str(&template[start..]);
            break;
        };
        let directive = &template[start..end + conv.len_utf8()];

        match conv {
            '%' => out.push('%'),
            'n' => out.push('\n'),
            's' | 'd' | 'i' | 'u' | 'x' | 'X' | 'o' | 'f' | 'e' | 'b' | 'c' => {
                match args.next() {
                    Some(arg) => {
                        let mut piece = String::new();
                        write_directive(&mut piece, conv, opts.precision, arg, directive);
                        opts.pad_into(&mut out, &piece, conv != 's' && conv != 'c' && conv != 'b');
                    }
                    None => out.push_str(directive),
                }
            }
            _ => out.push_str(directive),
        }
    }

    let rest: Vec<&Arg> = args.collect();
    if !rest.is_empty() {
        out.push_str(" [");
        for (i, arg) in rest.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{arg}");
        }
        out.push(']');
    }
    out
}

/// Flags, width and precision of one directive: `%-8s`, `%05d`, `%.2f`.
#[derive(Debug, Default)]
struct Padding {
    left: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Padding {
    fn pad_into(&self, out: &mut String, piece: &str, numeric: bool) {
        let len = piece.chars().count();
        let fill = match self.width {
            Some(width) if width > len => width - len,
            _ => {
                out.push_str(piece);
                return;
            }
        };
        if self.left {
            out.push_str(piece);
            out.extend(std::iter::repeat_n(' ', fill));
        } else if self.zero && numeric {
            let (sign, digits) = match piece.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", piece),
            };
            out.push_str(sign);
            out.extend(std::iter::repeat_n('0', fill));
            out.push_str(digits);
        } else {
            out.extend(std::iter::repeat_n(' ', fill));
            out.push_str(piece);
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> Option<usize> {
    let mut digits = 0usize;
    let mut value = 0usize;
    while let Some(&(_, d)) = chars.peek() {
        let Some(n) = d.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(n as usize);
        digits += 1;
        chars.next();
    }
    (digits > 0).then_some(value)
}

fn write_directive(out: &mut String, conv: char, precision: Option<usize>, arg: &Arg, raw: &str) {
    // String formatting into a String cannot fail.
    let _ = match conv {
        's' => match precision {
            Some(p) => write!(out, "{}", arg.to_string().chars().take(p).collect::<String>()),
            None => write!(out, "{arg}"),
        },
        'd' | 'i' | 'u' => match (arg.as_i128(), arg) {
            (Some(v), _) => write!(out, "{v}"),
            (None, Arg::Float(v)) => write!(out, "{}", v.trunc()),
            (None, _) => write!(out, "{arg}"),
        },
        'x' => match arg.as_i128() {
            Some(v) => write!(out, "{:x}", hex_bits(v, arg)),
            None => out.write_str(raw),
        },
        'X' => match arg.as_i128() {
            Some(v) => write!(out, "{:X}", hex_bits(v, arg)),
            None => out.write_str(raw),
        },
        'o' => match arg.as_i128() {
            Some(v) => write!(out, "{:o}", hex_bits(v, arg)),
            None => out.write_str(raw),
        },
        'f' => match arg.as_f64() {
            Some(v) => write!(out, "{:.*}", precision.unwrap_or(6), v),
            None => write!(out, "{arg}"),
        },
        'e' => match arg.as_f64() {
            Some(v) => match precision {
                Some(p) => write!(out, "{:.*e}", p, v),
                None => write!(out, "{v:e}"),
            },
            None => write!(out, "{arg}"),
        },
        'b' => write!(out, "{}", arg.truthy()),
        'c' => match arg {
            Arg::Char(c) => write!(out, "{c}"),
            other => match other.as_i128().and_then(|v| u32::try_from(v).ok()).and_then(char::from_u32) {
                Some(c) => write!(out, "{c}"),
                None => write!(out, "{other}"),
            },
        },
        _ => out.write_str(raw),
    };
}

/// Negative signed values print as their two's complement, like C's `%x`.
fn hex_bits(v: i128, arg: &Arg) -> u64 {
    match arg {
        Arg::Int(i) => *i as u64,
        _ => v as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_in_order() {
        let args = [Arg::from("disk"), Arg::from(3u8)];
        assert_eq!(render("%s failed %d times", &args), "disk failed 3 times");
    }

    #[test]
    fn literal_percent_and_newline() {
        assert_eq!(render("100%% done%n", &[]), "100% done\n");
    }

    #[test]
    fn precision_applies_to_floats_and_strings() {
        assert_eq!(render("%.3f", &[Arg::from(1.0f32)]), "1.000");
        assert_eq!(render("%.2s", &[Arg::from("abcdef")]), "ab");
        assert_eq!(render("%f", &[Arg::from(2)]), "2.000000");
    }

    #[test]
    fn hex_and_octal() {
        assert_eq!(render("%x %X %o", &[Arg::from(255), Arg::from(255), Arg::from(8)]), "ff FF 10");
        assert_eq!(render("%x", &[Arg::from(-1i8)]), "ffffffffffffffff");
    }

    #[test]
    fn missing_arguments_leave_directive_in_place() {
        assert_eq!(render("a=%d b=%d", &[Arg::from(1)]), "a=1 b=%d");
    }

    #[test]
    fn surplus_arguments_are_appended() {
        assert_eq!(render("done", &[Arg::from(1), Arg::from("x")]), "done [1, x]");
    }

    #[test]
    fn unknown_directive_and_trailing_percent_are_verbatim() {
        assert_eq!(render("%q %", &[Arg::from(1)]), "%q % [1]");
    }

    #[test]
    fn width_and_flags_pad_without_consuming_extra_arguments() {
        let args = [Arg::from(42), Arg::from("ab"), Arg::from(-7), Arg::from(1.5)];
        assert_eq!(render("[%5d|%-4s|%04d|%6.2f]", &args), "[   42|ab  |-007|  1.50]");
        assert_eq!(render("%2d", &[Arg::from(12345)]), "12345");
        assert_eq!(render("%05s", &[Arg::from("x")]), "    x");
    }

    #[test]
    fn display_arguments() {
        let addr = std::net::Ipv4Addr::LOCALHOST;
        assert_eq!(render("bound %s", &[Arg::display(addr)]), "bound 127.0.0.1");
        assert_eq!(render("%b %c", &[Arg::from(0), Arg::from(65u32)]), "false A");
    }
}
