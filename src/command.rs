//! Command-based control and the animation string notation.
//!
//! Each character of an animation string maps to one [`Action`]:
//!
//! | token | action |
//! |---|---|
//! | `w c m b y g r n` | set color by initial |
//! | `<` `>` | turn left / right |
//! | `v` `^` | wings pull / push |
//! | `!` `.` | heart show / hide |
//! | `x` | reset |
//! | `d f z p` | dance / fly / buzz / pulse |
//! | `,` | pause |
//! | `+` | no advance after the previous token |
//!
//! Any other character is ignored but still advances the timeline.

use core::iter;

use crate::types::{Color, Heart, Turn, Wings};

/// Actions for controlling a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    Color(Color),
    Turn(Turn),
    Wings(Wings),
    Heart(Heart),
    /// Discard queued work and switch everything off immediately.
    Reset,
    Dance,
    Fly,
    Buzz,
    Pulse,
    /// Advance the timeline only.
    Pause,
    /// Unrecognized token; advances the timeline like `Pause`.
    Ignore,
}

impl Action {
    /// Maps one animation token to its action.
    pub fn from_token(token: char) -> Self {
        match token {
            'w' => Action::Color(Color::White),
            'c' => Action::Color(Color::Cyan),
            'm' => Action::Color(Color::Magenta),
            'b' => Action::Color(Color::Blue),
            'y' => Action::Color(Color::Yellow),
            'g' => Action::Color(Color::Green),
            'r' => Action::Color(Color::Red),
            'n' => Action::Color(Color::Nothing),
            '<' => Action::Turn(Turn::Left),
            '>' => Action::Turn(Turn::Right),
            'v' => Action::Wings(Wings::Pull),
            '^' => Action::Wings(Wings::Push),
            '!' => Action::Heart(Heart::Show),
            '.' => Action::Heart(Heart::Hide),
            'x' => Action::Reset,
            'd' => Action::Dance,
            'f' => Action::Fly,
            'z' => Action::Buzz,
            'p' => Action::Pulse,
            ',' => Action::Pause,
            _ => Action::Ignore,
        }
    }
}

/// One interpreted token of an animation string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    /// Whether the timeline advances after this action. `false` when the
    /// next token is `+`.
    pub advance: bool,
}

/// Splits an animation string into steps, left to right.
///
/// `+` tokens produce no step of their own; they clear `advance` on the step
/// before them so the following action lands at the same instant.
pub fn parse(script: &str) -> impl Iterator<Item = Step> + '_ {
    let mut tokens = script.chars().peekable();
    iter::from_fn(move || {
        loop {
            let token = tokens.next()?;
            if token == '+' {
                continue;
            }
            let advance = tokens.peek() != Some(&'+');
            return Some(Step {
                action: Action::from_token(token),
                advance,
            });
        }
    })
}

/// Command targeting a device of a group by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand {
    pub position: usize,
    pub action: Action,
}

impl DeviceCommand {
    /// Creates command.
    pub fn new(position: usize, action: Action) -> Self {
        Self { position, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_token_is_recognized() {
        for token in "wcmbygrn<>v^!.xdfzp,".chars() {
            assert_ne!(Action::from_token(token), Action::Ignore, "token {token:?}");
        }
        assert_eq!(Action::from_token('q'), Action::Ignore);
        assert_eq!(Action::from_token(' '), Action::Ignore);
    }

    #[test]
    fn plus_clears_advance_of_previous_token() {
        let steps: Vec<Step> = parse("r+<d").collect();
        assert_eq!(
            steps,
            [
                Step { action: Action::Color(Color::Red), advance: false },
                Step { action: Action::Turn(Turn::Left), advance: true },
                Step { action: Action::Dance, advance: true },
            ]
        );
    }

    #[test]
    fn stray_plus_tokens_produce_no_steps() {
        let steps: Vec<Step> = parse("+!++.").collect();
        assert_eq!(steps.len(), 2);
        assert!(!steps[0].advance);
        assert!(steps[1].advance);
    }

    #[test]
    fn unknown_tokens_still_advance() {
        let steps: Vec<Step> = parse("?,").collect();
        assert_eq!(steps[0], Step { action: Action::Ignore, advance: true });
        assert_eq!(steps[1], Step { action: Action::Pause, advance: true });
    }
}
