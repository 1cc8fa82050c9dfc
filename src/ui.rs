use std::{
    io::{self, BufRead},
    thread,
};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, never, select, unbounded};

use crate::{
    game::{SessionControl, UiUpdate},
    types::Locale,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Abort,
    Pause,
    Resume,
    Quit,
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "start" => Some(ConsoleCommand::Start),
        "a" | "abort" => Some(ConsoleCommand::Abort),
        "p" | "pause" => Some(ConsoleCommand::Pause),
        "r" | "resume" => Some(ConsoleCommand::Resume),
        "q" | "quit" | "exit" => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

pub fn describe(update: &UiUpdate, locale: Locale) -> String {
    match update {
        UiUpdate::RoundStarted { round } => format!("--- round {round} ---"),
        UiUpdate::Countdown { remaining } => format!("{remaining}…"),
        UiUpdate::MachineMove {
            machine,
            frozen_frame,
        } => {
            let frozen = frozen_frame
                .as_ref()
                .map(|frame| format!(" [frame {}x{} frozen]", frame.width, frame.height))
                .unwrap_or_default();
            format!(
                "machine: {}{}{frozen}",
                machine.emoji(),
                machine.display_name(locale)
            )
        }
        UiUpdate::Judged {
            player, outcome, ..
        } => format!(
            "you: {}{}  =>  {} / {}",
            player.emoji(),
            player.display_name(locale),
            outcome.label(locale),
            locale.play_again()
        ),
        UiUpdate::ClassifierError { message, code } => {
            format!("classifier error ({code}): {message}")
        }
        UiUpdate::Aborted => "round aborted".to_string(),
        UiUpdate::Paused => "paused".to_string(),
        UiUpdate::Resumed => "resumed".to_string(),
    }
}

enum ConsoleInput {
    Update(Option<UiUpdate>),
    Line(Option<ConsoleCommand>),
}

/// Prints session updates and forwards stdin commands until the player quits.
pub fn run_console(
    control: SessionControl,
    updates: Receiver<UiUpdate>,
    locale: Locale,
    auto_rounds: Option<u32>,
) -> Result<()> {
    let mut commands = spawn_stdin_reader();
    let mut rounds_played = 0u32;

    match auto_rounds {
        Some(0) => return Ok(()),
        Some(total) => {
            println!("playing {total} rounds, show your hand when the countdown ends");
            control.start_round();
        }
        None => println!("press enter to play (a: abort, p: pause, r: resume, q: quit)"),
    }

    loop {
        let input = select! {
            recv(updates) -> update => ConsoleInput::Update(update.ok()),
            recv(commands) -> command => ConsoleInput::Line(command.ok()),
        };

        match input {
            ConsoleInput::Update(None) => break,
            ConsoleInput::Update(Some(update)) => {
                println!("{}", describe(&update, locale));
                if let (UiUpdate::Judged { .. }, Some(total)) = (&update, auto_rounds) {
                    rounds_played += 1;
                    if rounds_played >= total {
                        break;
                    }
                    control.start_round();
                }
            }
            ConsoleInput::Line(None) => {
                // Stdin closed; unattended runs keep going.
                if auto_rounds.is_none() {
                    break;
                }
                commands = never();
            }
            ConsoleInput::Line(Some(command)) => match command {
                ConsoleCommand::Start => {
                    control.start_round();
                }
                ConsoleCommand::Abort => {
                    control.abort();
                }
                ConsoleCommand::Pause => {
                    control.pause();
                }
                ConsoleCommand::Resume => {
                    control.resume();
                }
                ConsoleCommand::Quit => break,
            },
        }
    }

    Ok(())
}

fn spawn_stdin_reader() -> Receiver<ConsoleCommand> {
    let (tx, rx) = unbounded();
    thread::spawn(move || read_commands(io::stdin().lock(), tx));
    rx
}

fn read_commands(input: impl BufRead, tx: Sender<ConsoleCommand>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match parse_command(&line) {
            Some(command) => {
                if tx.send(command).is_err() {
                    break;
                }
            }
            None => println!("unknown command: {}", line.trim()),
        }
    }
}
