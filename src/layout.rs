// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token templates that turn a [`LogRecord`] into one display string.
//!
//! A layout is plain text with `{token}` placeholders; `{{` and `}}` are literal braces.
//!
//! | token       | renders                                                    |
//! |-------------|------------------------------------------------------------|
//! | `level`     | `INFO`, `WARN`, ...                                        |
//! | `message`   | the formatted message                                      |
//! | `time`      | capture time, formatted with the layout's time format      |
//! | `package`   | module path of the caller without its last segment         |
//! | `class`     | type (or module) of the caller                             |
//! | `method`    | calling function, `?` when no stack was captured           |
//! | `file`      | source file name                                           |
//! | `line`      | source line                                                |
//! | `stack`     | every captured frame, one `\n\tat ...` line each           |
//! | `stacktop`  | the call-site frame                                        |
//! | `cause`     | a `Caused by:` section per cause, frames capped per cause  |
//! | `thread`    | name (or id) of the logging thread                         |
//! | `namespace` | the routing namespace                                      |
//!
//! Layouts are parsed once, at configuration time; unknown tokens are a [`ConfigError`].

use crate::cause::DEFAULT_MAX_CAUSE_FRAMES;
use crate::error::ConfigError;
use crate::log_record::LogRecord;
use chrono::format::{Item, StrftimeItems};
use std::fmt::Write;
use std::str::FromStr;

pub const DEFAULT_LAYOUT: &str =
    "{time} {level} [{thread}] {class}.{method}({file}:{line}) {message}{cause}";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Token {
    Level,
    Message,
    Time,
    Package,
    Class,
    Method,
    File,
    Line,
    Stack,
    StackTop,
    Cause,
    Thread,
    Namespace,
}

impl FromStr for Token {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "level" => Token::Level,
            "message" => Token::Message,
            "time" => Token::Time,
            "package" => Token::Package,
            "class" => Token::Class,
            "method" => Token::Method,
            "file" => Token::File,
            "line" => Token::Line,
            "stack" => Token::Stack,
            "stacktop" => Token::StackTop,
            "cause" => Token::Cause,
            "thread" => Token::Thread,
            "namespace" => Token::Namespace,
            other => return Err(ConfigError::UnknownToken(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Token(Token),
}

/// A parsed layout.
///
/// ```
/// use logroute::{Level, LogRecord};
/// use logroute::layout::Layout;
/// use logroute::template::Arg;
///
/// let layout: Layout = "[{level}] {message}".parse().unwrap();
/// let record = LogRecord::new(Level::Warn, "x=%d").with_args(vec![Arg::from(5)]);
/// assert_eq!(layout.render(&record), "[WARN] x=5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pieces: Vec<Piece>,
    time_format: String,
    max_cause_frames: usize,
}

impl Layout {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut rest = pattern;
        let mut offset = 0usize;

        while let Some(idx) = rest.find(['{', '}']) {
            text.push_str(&rest[..idx]);
            let brace = rest.as_bytes()[idx];
            let after = &rest[idx + 1..];
            if after.as_bytes().first() == Some(&brace) {
                // `{{` or `}}`
                text.push(brace as char);
                rest = &after[1..];
                offset += idx + 2;
                continue;
            }
            if brace == b'}' {
                // a lone closing brace is just text
                text.push('}');
                rest = after;
                offset += idx + 1;
                continue;
            }
            let Some(close) = after.find('}') else {
                return Err(ConfigError::UnterminatedToken(offset + idx));
            };
            let token: Token = after[..close].trim().parse()?;
            if !text.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut text)));
            }
            pieces.push(Piece::Token(token));
            rest = &after[close + 1..];
            offset += idx + close + 2;
        }
        text.push_str(rest);
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }

        Ok(Self {
            pieces,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_cause_frames: DEFAULT_MAX_CAUSE_FRAMES,
        })
    }

    /// Sets the chrono format used for `{time}`.
    pub fn with_time_format(mut self, format: &str) -> Result<Self, ConfigError> {
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimeFormat(format.to_string()));
        }
        self.time_format = format.to_string();
        Ok(self)
    }

    /// Frames listed per cause by `{cause}`.
    pub fn with_max_cause_frames(mut self, max: usize) -> Result<Self, ConfigError> {
        if max == 0 {
            return Err(ConfigError::InvalidFrameCap);
        }
        self.max_cause_frames = max;
        Ok(self)
    }

    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(128);
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Token(token) => self.render_token(&mut out, *token, record),
            }
        }
        out
    }

    fn render_token(&self, out: &mut String, token: Token, record: &LogRecord) {
        // writing into a String cannot fail
        let _ = match token {
            Token::Level => write!(out, "{}", record.level()),
            Token::Message => out.write_str(record.message()),
            Token::Time => write!(out, "{}", record.timestamp().format(&self.time_format)),
            Token::Package => out.write_str(record.package()),
            Token::Class => out.write_str(record.class()),
            Token::Method => out.write_str(record.method()),
            Token::File => out.write_str(record.file()),
            Token::Line => write!(out, "{}", record.line()),
            Token::Stack => {
                for frame in record.stack() {
                    let _ = write!(out, "\n\tat {frame}");
                }
                Ok(())
            }
            Token::StackTop => match record.location() {
                Some(frame) => write!(out, "{frame}"),
                None => {
                    let site = record.call_site();
                    write!(out, "{} ({}:{})", site.namespace, site.file, site.line)
                }
            },
            Token::Cause => match record.cause() {
                Some(cause) => out.write_str(&cause.render(self.max_cause_frames)),
                None => Ok(()),
            },
            Token::Thread => out.write_str(&record.thread_name()),
            Token::Namespace => out.write_str(record.namespace()),
        };
    }
}

impl Default for Layout {
    /// [`DEFAULT_LAYOUT`], prebuilt.
    fn default() -> Self {
        let text = |s: &str| Piece::Text(s.to_string());
        Self {
            pieces: vec![
                Piece::Token(Token::Time),
                text(" "),
                Piece::Token(Token::Level),
                text(" ["),
                Piece::Token(Token::Thread),
                text("] "),
                Piece::Token(Token::Class),
                text("."),
                Piece::Token(Token::Method),
                text("("),
                Piece::Token(Token::File),
                text(":"),
                Piece::Token(Token::Line),
                text(") "),
                Piece::Token(Token::Message),
                Piece::Token(Token::Cause),
            ],
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_cause_frames: DEFAULT_MAX_CAUSE_FRAMES,
        }
    }
}

impl FromStr for Layout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
