//! Chat Commands
//!
//! Commands are matched anywhere in the message text, one per message,
//! in priority order: `!jump`, `!color`, `!fight`. The exception is
//! `!check`, which must be the first word since it carries arguments.

use crate::game::viewer::Rgba;

/// A recognized chat command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// `!check <code> <ref>`; arguments are parsed by the challenge queue.
    Check,
    /// `!jump`
    Jump,
    /// `!color [#RRGGBB|#RGB]`; `None` asks for a random tint.
    Color(Option<Rgba>),
    /// `!fight`
    Fight,
}

/// Find the command in a message, if any.
pub fn parse(text: &str) -> Option<Command> {
    let mut words = text.split_whitespace();
    let first = words.next();

    if first == Some("!check") {
        return Some(Command::Check);
    }
    if text.contains("!jump") {
        return Some(Command::Jump);
    }
    if text.contains("!color") {
        // Argument position is fixed, whatever word carried the command.
        let arg = text.split_whitespace().nth(1);
        return Some(Command::Color(arg.and_then(parse_color)));
    }
    if text.contains("!fight") {
        return Some(Command::Fight);
    }
    None
}

/// Parse `#RRGGBB` or `#RGB` into an opaque color.
pub fn parse_color(s: &str) -> Option<Rgba> {
    let digits = s.strip_prefix('#')?;
    let expanded = match digits.len() {
        6 => digits.to_string(),
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        _ => return None,
    };

    let mut rgb = [0u8; 3];
    hex::decode_to_slice(expanded, &mut rgb).ok()?;
    Some(Rgba::rgb(rgb[0], rgb[1], rgb[2]))
}
