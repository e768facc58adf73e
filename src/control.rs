//! Line-oriented control surface.
//!
//! Commands are read from stdin on a separate thread and handed to the main
//! loop over a channel, one per line:
//!
//! ```text
//! start | quit | reload | dump | collection <id> | transition <name>
//! ```

use std::io::BufRead;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use tracing::{debug, warn};

use crate::slide::CollectionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Quit,
    Reload,
    Dump,
    Collection(CollectionId),
    Transition(String),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for '{}'", verb));
        }

        match (verb, arg) {
            ("start", None) => Ok(Command::Start),
            ("quit", None) => Ok(Command::Quit),
            ("reload", None) => Ok(Command::Reload),
            ("dump", None) => Ok(Command::Dump),
            ("collection", Some(id)) => id
                .parse()
                .map(|id| Command::Collection(CollectionId(id)))
                .map_err(|e| format!("bad collection id '{}': {}", id, e)),
            ("transition", Some(name)) => Ok(Command::Transition(name.to_string())),
            ("collection" | "transition", None) => Err(format!("'{}' needs an argument", verb)),
            (_, Some(_)) if ["start", "quit", "reload", "dump"].contains(&verb) => {
                Err(format!("'{}' takes no argument", verb))
            }
            _ => Err(format!("unknown command '{}'", verb)),
        }
    }
}

/// Read commands from `input` on a background thread.
///
/// The channel closes when the input ends.
pub fn spawn_reader<R: BufRead + Send + 'static>(input: R) -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    debug!("Control command: {:?}", command);
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring control input: {}", e),
            }
        }
    });
    rx
}
