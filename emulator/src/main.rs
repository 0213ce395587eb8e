mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use drumflash_core::timing::FlashProfile;
use session::Session;

const USAGE: &str =
    "Usage: drumflash-emulator [--profile <standard|short>] [--transcript <path>]";

struct Options {
    profile: FlashProfile,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.profile, options.transcript.as_deref())?;
    let mut line = String::new();

    let profile = session.profile();
    writeln!(
        writer,
        "DrumFlash bench ready (profile {}: flash {} ms, deaf {} ms). Type `help` for commands or `exit` to quit.",
        profile.name,
        profile.flash.as_millis(),
        profile.deaf.as_millis()
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        profile: FlashProfile::STANDARD,
        transcript: None,
    };

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            options.profile = profile_from_tag(value)?;
        } else if arg == "--profile" {
            let value = args.next().ok_or("Expected value after --profile")?;
            options.profile = profile_from_tag(&value)?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected path after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    Ok(options)
}

fn profile_from_tag(tag: &str) -> Result<FlashProfile, String> {
    FlashProfile::by_name(tag).ok_or_else(|| format!("Unknown profile `{tag}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| (*value).to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn defaults_to_standard_profile() {
        let options = parse_options(args(&[])).expect("defaults");
        assert_eq!(options.profile, FlashProfile::STANDARD);
        assert!(options.transcript.is_none());
    }

    #[test]
    fn accepts_both_flag_spellings() {
        let options = parse_options(args(&["--profile", "SHORT"])).expect("profile");
        assert_eq!(options.profile, FlashProfile::SHORT);

        let options =
            parse_options(args(&["--profile=short", "--transcript=out/bench.log"])).expect("both");
        assert_eq!(options.profile, FlashProfile::SHORT);
        assert_eq!(options.transcript, Some(PathBuf::from("out/bench.log")));
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_options(args(&["--profile", "strobe"])).is_err());
        assert!(parse_options(args(&["--profile"])).is_err());
        assert!(parse_options(args(&["--loud"])).is_err());
    }
}
