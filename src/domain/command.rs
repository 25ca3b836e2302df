/// Operator commands accepted over the chat channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Status,
    List,
    Screenshot,
    Report,
    Pause,
    Resume,
    Targets,
    /// `None` when the operator forgot the name.
    Add(Option<String>),
    Remove(Option<String>),
    Help,
    Ping,
}

impl Command {
    /// Parse `/name args...`. Returns `None` for anything unrecognised.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let head = parts.next()?;
        // "/status@my_bot" in group chats
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<&str> = parts.collect();
        let arg = if args.is_empty() {
            None
        } else {
            Some(args.join(" "))
        };

        let cmd = match name.as_str() {
            "status" => Command::Status,
            "list" => Command::List,
            "print" | "screenshot" => Command::Screenshot,
            "report" | "relatorio" => Command::Report,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "targets" | "alvos" => Command::Targets,
            "add" => Command::Add(arg),
            "remove" => Command::Remove(arg),
            "help" => Command::Help,
            "ping" => Command::Ping,
            _ => return None,
        };
        Some(cmd)
    }
}

pub const HELP_TEXT: &str = "<b>COMMANDS</b>
/status - monitor state
/list - slots visible now
/print - screenshot of the page
/report - hourly opening chart
/add NAME - add a target
/remove NAME - remove targets containing NAME
/targets - show targets
/pause - pause polling
/resume - resume polling
/ping - liveness check";
