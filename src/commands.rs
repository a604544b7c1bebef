//! Command palette entries and suggestion ranking.

use crate::nav::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
  Open(TabId),
  Refresh,
  ClearCache,
  Reset,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: CommandAction,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home"],
    description: "System overview",
    action: CommandAction::Open(TabId::Dashboard),
  },
  Command {
    name: "generate",
    aliases: &["g", "gen", "new"],
    description: "Issue a license",
    action: CommandAction::Open(TabId::Generate),
  },
  Command {
    name: "validate",
    aliases: &["v", "check"],
    description: "Validate, look up, renew or deactivate a license",
    action: CommandAction::Open(TabId::Validate),
  },
  Command {
    name: "admin",
    aliases: &["a", "modules", "types"],
    description: "Manage modules and license types",
    action: CommandAction::Open(TabId::Admin),
  },
  Command {
    name: "control",
    aliases: &["c", "licenses"],
    description: "Issued licenses, toggles and purchases",
    action: CommandAction::Open(TabId::Control),
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Reload the current tab",
    action: CommandAction::Refresh,
  },
  Command {
    name: "clear-cache",
    aliases: &["cc", "flush"],
    description: "Drop cached modules and license types",
    action: CommandAction::ClearCache,
  },
  Command {
    name: "reset",
    aliases: &["hard-refresh"],
    description: "Drop the cache and stored console state, then reload",
    action: CommandAction::Reset,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit licdeck",
    action: CommandAction::Quit,
  },
];

/// Rank: exact name, exact alias, name prefix, alias prefix, name substring,
/// alias substring.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let needle = input.trim().to_lowercase();
  if needle.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(&Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &needle).map(|r| (cmd, r)))
    .collect();
  ranked.sort_by_key(|(_, r)| *r);
  ranked.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, needle: &str) -> Option<u8> {
  let alias = |test: &dyn Fn(&str) -> bool| cmd.aliases.iter().any(|a| test(a));

  if cmd.name == needle {
    Some(0)
  } else if alias(&|a| a == needle) {
    Some(1)
  } else if cmd.name.starts_with(needle) {
    Some(2)
  } else if alias(&|a| a.starts_with(needle)) {
    Some(3)
  } else if cmd.name.contains(needle) {
    Some(4)
  } else if alias(&|a| a.contains(needle)) {
    Some(5)
  } else {
    None
  }
}

/// Resolve typed text to a command by exact name or alias
pub fn lookup(input: &str) -> Option<&'static Command> {
  let needle = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|c| c.name == needle || c.aliases.contains(&needle.as_str()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_lists_everything() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_name_first() {
    assert_eq!(get_suggestions("control")[0].name, "control");
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "c" is control's alias and also a prefix of clear-cache
    let names: Vec<_> = get_suggestions("c").iter().map(|c| c.name).collect();
    assert_eq!(names[0], "control");
    assert!(names.contains(&"clear-cache"));
  }

  #[test]
  fn test_substring_match() {
    assert_eq!(get_suggestions("cache")[0].name, "clear-cache");
    assert_eq!(get_suggestions("idat")[0].name, "validate");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_lookup() {
    assert_eq!(lookup("GEN").unwrap().action, CommandAction::Open(TabId::Generate));
    assert_eq!(lookup("exit").unwrap().action, CommandAction::Quit);
    assert_eq!(lookup("hard-refresh").unwrap().action, CommandAction::Reset);
    assert!(lookup("gener").is_none());
  }
}
