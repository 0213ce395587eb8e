use core::time::Duration;

use drumflash_core::console::{
    BenchSpan, ConsoleCommand, ConsoleError, HELP_TOPICS, help_for, parse_command,
};
use drumflash_core::machine::FlashState;
use drumflash_core::sim::BenchRig;
use drumflash_core::timing::FlashProfile;

/// Minimal driver applying parsed commands to a rig.
fn apply(rig: &mut BenchRig, line: &str) -> Result<(), ConsoleError> {
    match parse_command(line)? {
        ConsoleCommand::Sound => {
            rig.sound();
        }
        ConsoleCommand::Advance(BenchSpan::Time(duration)) => {
            rig.advance(duration);
        }
        ConsoleCommand::Advance(BenchSpan::Ticks(ticks)) => {
            rig.advance_ticks(ticks);
        }
        ConsoleCommand::RunToIdle => {
            rig.run_until_idle(1_000);
        }
        ConsoleCommand::Reset => *rig = BenchRig::powered(rig.profile()),
        ConsoleCommand::Status | ConsoleCommand::Trace | ConsoleCommand::Help(_) => {}
    }
    Ok(())
}

#[test]
fn scripted_session_walks_the_cycle() {
    let mut rig: BenchRig = BenchRig::powered(FlashProfile::STANDARD);

    for (line, expected) in [
        ("sound", FlashState::Triggered),
        ("advance 90ms", FlashState::Triggered),
        ("ADVANCE 5t", FlashState::Deaf),
        ("sound", FlashState::Deaf),
        ("run", FlashState::Idle),
        ("sound", FlashState::Triggered),
        ("reset", FlashState::Idle),
    ] {
        apply(&mut rig, line).expect(line);
        assert_eq!(rig.state(), expected, "after `{line}`");
    }
    assert_eq!(rig.machine().triggers(), 0, "reset starts a fresh rig");
}

#[test]
fn every_help_topic_parses_and_resolves() {
    for (topic, detail) in HELP_TOPICS {
        assert_eq!(help_for(topic), Some(*detail));
        let line = format!("help {topic}");
        assert_eq!(parse_command(&line), Ok(ConsoleCommand::Help(Some(*topic))));
    }
}

#[test]
fn seconds_and_ticks_are_distinct_units() {
    assert_eq!(
        parse_command("advance 1s"),
        Ok(ConsoleCommand::Advance(BenchSpan::Time(Duration::from_secs(1))))
    );
    assert_eq!(
        parse_command("advance 1t"),
        Ok(ConsoleCommand::Advance(BenchSpan::Ticks(1)))
    );
}

#[test]
fn syntax_errors_report_an_offset() {
    match parse_command("advance 5 ms") {
        Err(ConsoleError::Syntax { offset }) => assert!(offset <= "advance 5 ms".len()),
        other => panic!("expected syntax error, got {other:?}"),
    }
    assert_eq!(parse_command(""), Err(ConsoleError::Empty));
}
