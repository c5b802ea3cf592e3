pub mod setup;
pub mod verify;

pub use setup::verifyconfig;
pub use verify::verify;

use crate::bot::Data;

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Get all registered commands
pub fn all_commands() -> Vec<poise::Command<Data, Error>> {
    vec![verifyconfig(), verify()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_each_command_registered_once() {
        let commands = all_commands();
        let names: HashSet<_> = commands.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names.len(), commands.len());
        assert!(names.contains("verify"));
        assert!(names.contains("verifyconfig"));
    }

    #[test]
    fn test_config_subcommands() {
        let config = verifyconfig();
        let subs: Vec<_> = config.subcommands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(subs, vec!["set", "clear", "status"]);
    }
}
