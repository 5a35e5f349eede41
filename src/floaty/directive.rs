//! Text directive parsing.
//!
//! Operators configure identifiers with a small block directive:
//!
//! ```text
//! floaty [<length> [<duration>]] {
//!     <name> [<length> [<duration>]]
//!     ...
//! }
//! ```
//!
//! The first line configures the root entry; each line inside the block
//! configures a named entry. The block is optional. `#` starts a comment.

use crate::floaty::config::{EntryConfig, FloatyConfig, ROOT, parse_duration, validate_name};
use crate::floaty::error::FloatyError;

const DIRECTIVE: &str = "floaty";

/// Parses a `floaty` directive into a [`FloatyConfig`].
///
/// Lengths must be positive integers; durations use the syntax accepted by
/// [`parse_duration`]. Anything malformed rejects the whole directive with an
/// error naming the offending line.
///
/// # Example
///
/// ```rust
/// use floaty::parse_directive;
///
/// let config = parse_directive(
///     "floaty 8 1m {
///         session 16 30s
///         canary 6
///     }",
/// )?;
/// assert_eq!(config.length, Some(8));
/// assert_eq!(config.additional.len(), 2);
/// # Ok::<(), floaty::FloatyError>(())
/// ```
pub fn parse_directive(text: &str) -> Result<FloatyConfig, FloatyError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, tokenize(line)))
        .filter(|(_, tokens)| !tokens.is_empty());

    let (line_no, head) = lines
        .next()
        .ok_or_else(|| FloatyError::InvalidConfig("missing `floaty` directive".to_string()))?;

    if head[0] != DIRECTIVE {
        return Err(line_error(
            line_no,
            &format!("expected `{DIRECTIVE}`, found `{}`", head[0]),
        ));
    }

    let (args, opens_block) = split_block_opener(&head[1..], line_no)?;
    let root = parse_entry_args(args, line_no)?;
    let mut config = FloatyConfig {
        length: root.length,
        duration: root.duration,
        ..FloatyConfig::default()
    };

    if !opens_block {
        return match lines.next() {
            Some((line_no, tokens)) => Err(line_error(
                line_no,
                &format!("unexpected `{}` after directive", tokens[0]),
            )),
            None => Ok(config),
        };
    }

    let mut closed = false;
    for (line_no, tokens) in lines.by_ref() {
        if tokens[0] == "}" {
            if tokens.len() > 1 {
                return Err(line_error(
                    line_no,
                    &format!("unexpected `{}` after `}}`", tokens[1]),
                ));
            }
            closed = true;
            break;
        }

        if let Some(brace) = tokens.iter().find(|t| *t == "{" || *t == "}") {
            return Err(line_error(line_no, &format!("unexpected `{brace}`")));
        }

        let name = &tokens[0];
        validate_name(name)?;
        if name == ROOT || config.additional.contains_key(name) {
            return Err(FloatyError::DuplicateEntry(name.clone()));
        }
        let entry = parse_entry_args(&tokens[1..], line_no)?;
        config.additional.insert(name.clone(), entry);
    }

    if !closed {
        return Err(FloatyError::InvalidConfig(
            "unclosed `{` in floaty directive".to_string(),
        ));
    }
    if let Some((line_no, tokens)) = lines.next() {
        return Err(line_error(
            line_no,
            &format!("unexpected `{}` after block", tokens[0]),
        ));
    }

    Ok(config)
}

/// Splits a line into tokens, treating braces as tokens of their own and
/// dropping comments.
fn tokenize(line: &str) -> Vec<String> {
    let code = line.split('#').next().unwrap_or_default();
    code.replace('{', " { ")
        .replace('}', " } ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn split_block_opener(args: &[String], line_no: usize) -> Result<(&[String], bool), FloatyError> {
    match args.iter().position(|t| t == "{" || t == "}") {
        None => Ok((args, false)),
        Some(pos) if pos == args.len() - 1 && args[pos] == "{" => Ok((&args[..pos], true)),
        Some(pos) => Err(line_error(line_no, &format!("unexpected `{}`", args[pos]))),
    }
}

fn parse_entry_args(args: &[String], line_no: usize) -> Result<EntryConfig, FloatyError> {
    if args.len() > 2 {
        return Err(line_error(
            line_no,
            &format!("too many arguments, unexpected `{}`", args[2]),
        ));
    }

    let length = args
        .first()
        .map(|text| parse_length(text, line_no))
        .transpose()?;
    let duration = args
        .get(1)
        .map(|text| {
            parse_duration(text).map_err(|e| line_error(line_no, &e.to_string()))
        })
        .transpose()?;

    Ok(EntryConfig { length, duration })
}

fn parse_length(text: &str, line_no: usize) -> Result<usize, FloatyError> {
    let length: i64 = text.parse().map_err(|_| {
        line_error(line_no, &format!("length `{text}` is not an integer"))
    })?;
    if length < 1 {
        return Err(line_error(line_no, "length must be a positive integer"));
    }
    usize::try_from(length)
        .map_err(|_| line_error(line_no, &format!("length `{text}` is out of range")))
}

fn line_error(line_no: usize, message: &str) -> FloatyError {
    FloatyError::InvalidConfig(format!("line {line_no}: {message}"))
}
