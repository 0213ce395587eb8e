//! Command grammar for the bench console.
//!
//! The emulator reads one command per line. Keywords are matched without
//! regard to case and spans accept `ms`, `s`, or `t` (raw timer ticks)
//! suffixes:
//!
//! ```text
//! sound | advance <n>(ms|s|t) | run | status | trace | reset | help [topic]
//! ```

use core::fmt;
use core::time::Duration;

use winnow::ModalResult;
use winnow::ascii::{Caseless, alpha1, digit1, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;

/// Amount of bench time to advance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BenchSpan {
    Time(Duration),
    Ticks(u64),
}

/// Parsed console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand<'a> {
    /// Deliver one comparator edge.
    Sound,
    Advance(BenchSpan),
    /// Advance until the machine is back in idle.
    RunToIdle,
    Status,
    Trace,
    /// Power-cycle the bench.
    Reset,
    Help(Option<&'a str>),
}

/// Errors produced while parsing a console line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    Empty,
    Syntax { offset: usize },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::Syntax { offset } => write!(f, "unexpected input at column {offset}"),
        }
    }
}

/// Help topics in display order.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("sound", "sound                  - deliver one comparator edge"),
    (
        "advance",
        "advance <n>(ms|s|t)    - move bench time forward",
    ),
    ("run", "run                    - advance until the detector re-arms"),
    ("status", "status                 - show light, lines and state"),
    ("trace", "trace                  - list recorded transitions"),
    ("reset", "reset                  - power-cycle the bench"),
    ("help", "help [topic]           - show help for a command"),
];

/// Parses a single console line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand<'_>, ConsoleError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::Empty);
    }
    command.parse(trimmed).map_err(|err| ConsoleError::Syntax {
        offset: err.offset(),
    })
}

/// Looks up help text for `topic`.
#[must_use]
pub fn help_for(topic: &str) -> Option<&'static str> {
    HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, detail)| *detail)
}

fn command<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    alt((
        Caseless("sound").value(ConsoleCommand::Sound),
        preceded((Caseless("advance"), space1), span).map(ConsoleCommand::Advance),
        Caseless("run").value(ConsoleCommand::RunToIdle),
        Caseless("status").value(ConsoleCommand::Status),
        Caseless("trace").value(ConsoleCommand::Trace),
        Caseless("reset").value(ConsoleCommand::Reset),
        preceded(Caseless("help"), opt(preceded(space1, alpha1))).map(ConsoleCommand::Help),
    ))
    .parse_next(input)
}

#[derive(Copy, Clone)]
enum SpanUnit {
    Millis,
    Seconds,
    Ticks,
}

fn span(input: &mut &str) -> ModalResult<BenchSpan> {
    let unit = alt((
        Caseless("ms").value(SpanUnit::Millis),
        Caseless("s").value(SpanUnit::Seconds),
        Caseless("t").value(SpanUnit::Ticks),
    ));

    (digit1.parse_to::<u64>(), unit)
        .map(|(amount, unit)| match unit {
            SpanUnit::Millis => BenchSpan::Time(Duration::from_millis(amount)),
            SpanUnit::Seconds => BenchSpan::Time(Duration::from_secs(amount)),
            SpanUnit::Ticks => BenchSpan::Ticks(amount),
        })
        .parse_next(input)
}
