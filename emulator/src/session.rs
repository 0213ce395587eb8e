use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use drumflash_core::console::{
    BenchSpan, ConsoleCommand, ConsoleError, HELP_TOPICS, help_for, parse_command,
};
use drumflash_core::machine::{FlashState, Transition};
use drumflash_core::sim::{BenchInstant, BenchRig};
use drumflash_core::telemetry::TransitionRecord;
use drumflash_core::timing::{COUNTER_MAX, FlashProfile};

/// Tick budget for `run`; any cycle finishes well inside two full counters.
const RUN_TICK_LIMIT: u64 = 2 * COUNTER_MAX as u64 + 2;

pub struct Session {
    profile: FlashProfile,
    rig: BenchRig,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(profile: FlashProfile, transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript
            .map(|path| TranscriptLogger::new(path, profile))
            .transpose()?;

        Ok(Self {
            profile,
            rig: BenchRig::powered(profile),
            transcript,
        })
    }

    pub fn profile(&self) -> FlashProfile {
        self.profile
    }

    #[cfg(test)]
    pub fn rig(&self) -> &BenchRig {
        &self.rig
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.rig.now().since_power_up();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(ConsoleError::Empty) => Vec::new(),
            Err(err @ ConsoleError::Syntax { .. }) => {
                vec![format!("ERR syntax {err} (try `help`)")]
            }
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand<'_>) -> Vec<String> {
        match command {
            ConsoleCommand::Sound => self.handle_sound(),
            ConsoleCommand::Advance(span) => self.handle_advance(span),
            ConsoleCommand::RunToIdle => self.handle_run(),
            ConsoleCommand::Status => vec![self.status_line()],
            ConsoleCommand::Trace => self.handle_trace(),
            ConsoleCommand::Reset => {
                self.rig = BenchRig::powered(self.profile);
                vec![
                    format!("OK reset (profile {})", self.profile.name),
                    self.status_line(),
                ]
            }
            ConsoleCommand::Help(topic) => handle_help(topic),
        }
    }

    fn handle_sound(&mut self) -> Vec<String> {
        let state = self.rig.state();
        let head = match self.rig.sound() {
            Some(transition) => format!("OK sound accepted: {}", describe(transition)),
            None => format!("OK sound ignored ({state})"),
        };
        vec![head, self.status_line()]
    }

    fn handle_advance(&mut self, span: BenchSpan) -> Vec<String> {
        let first_new = self.rig.telemetry().total_recorded();
        let ticks = match span {
            BenchSpan::Time(duration) => self.rig.ticks_for(duration),
            BenchSpan::Ticks(ticks) => ticks,
        };
        self.rig.advance_ticks(ticks);

        let mut lines = vec![format!("OK advanced {ticks} ticks")];
        lines.extend(self.records_since(first_new));
        lines.push(self.status_line());
        lines
    }

    fn handle_run(&mut self) -> Vec<String> {
        let first_new = self.rig.telemetry().total_recorded();
        let head = match self.rig.run_until_idle(RUN_TICK_LIMIT) {
            Some(spent) => format!("OK idle after {}", format_millis(spent)),
            None => format!("ERR still {} after {RUN_TICK_LIMIT} ticks", self.rig.state()),
        };

        let mut lines = vec![head];
        lines.extend(self.records_since(first_new));
        lines.push(self.status_line());
        lines
    }

    fn handle_trace(&self) -> Vec<String> {
        let telemetry = self.rig.telemetry();
        let mut lines = vec![format!(
            "OK {} of {} transitions",
            telemetry.len(),
            telemetry.total_recorded()
        )];
        lines.extend(telemetry.oldest_first().map(format_record));
        lines
    }

    fn records_since(&self, first_new: u32) -> Vec<String> {
        self.rig
            .telemetry()
            .oldest_first()
            .filter(|record| record.id >= first_new)
            .map(format_record)
            .collect()
    }

    fn status_line(&self) -> String {
        let rig = &self.rig;
        let (debug0, debug1) = rig.diagnostic().lines();
        format!(
            "light={} debug={}{} ({}) state={} armed={} timer={} triggers={} t={}",
            if rig.light_on() { "on" } else { "off" },
            u8::from(debug1),
            u8::from(debug0),
            rig.diagnostic(),
            rig.state(),
            if rig.armed() { "yes" } else { "no" },
            if rig.timer_running() { "running" } else { "stopped" },
            rig.machine().triggers(),
            format_millis(rig.now().since_power_up()),
        )
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let elapsed = self.rig.now().since_power_up();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some(detail) = help_for(target) {
                lines.push(detail.to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(transition: Transition) -> String {
    let from = transition.from.map_or("reset", FlashState::label);
    format!(
        "{from} -> {} ({})",
        transition.to,
        transition.cause.label()
    )
}

fn format_record(record: &TransitionRecord<BenchInstant>) -> String {
    let transition = Transition {
        from: record.from,
        to: record.to,
        cause: record.cause,
    };
    let delta = record
        .elapsed_since_previous
        .map(|elapsed| format!(" Δ={}", format_millis(elapsed)))
        .unwrap_or_default();
    format!(
        "  #{:<3} t={} {}{delta}",
        record.id,
        format_millis(record.timestamp.since_power_up()),
        describe(transition)
    )
}

fn format_millis(duration: Duration) -> String {
    let micros = duration.as_micros();
    format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
}

/// Plain-text log of a bench session, stamped with bench time.
struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, profile: FlashProfile) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: FlashProfile) -> io::Result<()> {
        writeln!(self.writer, "# DrumFlash bench transcript (profile {})", profile.name)?;
        writeln!(
            self.writer,
            "# Timestamps are bench milliseconds since power-up"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>12}] {} {}",
            format_millis(elapsed),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
