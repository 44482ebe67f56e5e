//! Operator command dispatcher. The same binary that runs the master doubles
//! as its control CLI: tokens on the command line are matched against a
//! registry of named commands, and every matching handler runs. Commands are
//! exit-actions: once any handler has run, the process terminates.

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use crate::liveness::{self, Liveness};
use crate::master::MasterHandle;
use crate::pidfiles;
use crate::signals;

/// What a handler asks the host process to do once dispatch finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Exit(i32),
}

/// Context handed to every handler: the master handle, the full command list
/// (so help can render the registry) and the validated PID directory.
pub struct CommandEnv<'a> {
    pub master: &'a dyn MasterHandle,
    pub commands: &'a [Command],
    pub pid_dir: &'a Path,
}

type Handler = Box<dyn Fn(&CommandEnv) -> anyhow::Result<CommandAction> + Send + Sync>;

pub struct Command {
    aliases: Vec<&'static str>,
    description: &'static str,
    handler: Handler,
}

impl Command {
    pub fn aliases(&self) -> &[&'static str] {
        &self.aliases
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

/// Ordered, append-only command registry. Built by the host and passed to
/// the dispatcher; registration order is preserved for matching and for
/// help display.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a command. `aliases` is a comma-separated alias list in the
    /// style of `"-s, --status, status"`; each alias matches a CLI token
    /// literally.
    pub fn define<F>(&mut self, aliases: &'static str, description: &'static str, handler: F) -> &mut Self
    where
        F: Fn(&CommandEnv) -> anyhow::Result<CommandAction> + Send + Sync + 'static,
    {
        self.commands.push(Command {
            aliases: aliases.split(',').map(str::trim).collect(),
            description,
            handler: Box::new(handler),
        });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("cli dispatch requires the pidfiles capability on the master handle")]
    MissingPidDir,

    #[error(transparent)]
    Command(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// At least one command matched; the host should exit with this code.
    Exit(i32),
    /// No token matched any command; proceed as the master daemon.
    NoCommand,
}

pub struct Dispatcher {
    registry: CommandRegistry,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry) -> Self {
        Self { registry }
    }

    /// Scan `args` left to right. For each token, collect every command whose
    /// alias set contains it, then invoke them all in registration order.
    /// This is deliberately not first-match, so overlapping aliases (`-s`
    /// belongs to both status and shutdown) trigger every owner. Unmatched
    /// tokens are silently ignored. Handler errors propagate unhandled.
    pub fn dispatch(&self, master: &dyn MasterHandle, args: &[String]) -> Result<Dispatch, DispatchError> {
        let pid_dir = master.pid_dir().ok_or(DispatchError::MissingPidDir)?;
        let env = CommandEnv {
            master,
            commands: self.registry.commands(),
            pid_dir,
        };

        let mut exit: Option<i32> = None;
        for arg in args {
            let matched: Vec<&Command> = env
                .commands
                .iter()
                .filter(|c| c.aliases.iter().any(|a| *a == arg.as_str()))
                .collect();
            for command in matched {
                match (command.handler)(&env)? {
                    CommandAction::Exit(code) => {
                        // first requested code wins, remaining handlers still run
                        exit.get_or_insert(code);
                    }
                }
            }
        }

        Ok(match exit {
            Some(code) => Dispatch::Exit(code),
            None => Dispatch::NoCommand,
        })
    }
}

/// One status line per PID file in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    pub name: String,
    pub pid: u32,
    pub liveness: Liveness,
}

/// Classify every tracked process by probing its recorded PID with the null
/// signal. A probe error other than "no such process" aborts the whole scan.
pub fn cluster_status(pid_dir: &Path) -> anyhow::Result<Vec<ProcessStatus>> {
    let mut statuses = Vec::new();
    for file in pidfiles::list(pid_dir)? {
        let pid = pidfiles::read_pid(&file)?;
        statuses.push(ProcessStatus {
            name: pidfiles::display_name(&file),
            pid,
            liveness: liveness::probe(pid)?,
        });
    }
    Ok(statuses)
}

/// Usage text plus every registered command with its aliases and
/// description, in registration order.
pub fn render_help(commands: &[Command]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n  Usage: herd <command>\n");
    for command in commands {
        let _ = writeln!(out, "    {}", command.aliases.join(", "));
        let _ = writeln!(out, "    \x1b[90m{}\x1b[0m\n", command.description);
    }
    out
}

/// The stock command set, in its canonical registration order. The `-s`
/// alias appears on both status and shutdown; combined with the
/// run-all-matching policy, a bare `-s` triggers both handlers. That
/// overlap is part of the documented alias table.
pub fn builtin() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.define("-s, --status, status", "Output cluster status", |env| {
        println!();
        for status in cluster_status(env.pid_dir)? {
            let (color, state) = match status.liveness {
                Liveness::Alive => ("36", "alive"),
                Liveness::Dead => ("31", "dead"),
            };
            println!(
                "  {}\x1b[90m {}\x1b[0m \x1b[{}m{}\x1b[0m",
                status.name, status.pid, color, state
            );
        }
        println!();
        Ok(CommandAction::Exit(0))
    });

    registry.define(
        "-r, --restart, restart",
        "Restart workers by sending the master SIGUSR2",
        |env| signal_master(env, "SIGUSR2"),
    );

    registry.define(
        "-s, --shutdown, shutdown",
        "Graceful shutdown by sending the master SIGQUIT",
        |env| signal_master(env, "SIGQUIT"),
    );

    registry.define(
        "-S, --stop, stop",
        "Hard shutdown by sending the master SIGTERM",
        |env| signal_master(env, "SIGTERM"),
    );

    registry.define("-h, --help, help", "Show help information", |env| {
        print!("{}", render_help(env.commands));
        Ok(CommandAction::Exit(0))
    });

    registry.define("-v, --version", "Output the herd version", |_env| {
        println!("{}", env!("CARGO_PKG_VERSION"));
        Ok(CommandAction::Exit(0))
    });

    registry
}

/// Locate the master through its PID file and deliver one signal to it.
/// A missing or unparseable PID file is fatal; there is nothing to signal.
fn signal_master(env: &CommandEnv, signal: &str) -> anyhow::Result<CommandAction> {
    let pid = env.master.master_pid()?;
    signals::send(pid, signal)?;
    Ok(CommandAction::Exit(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    struct StubMaster {
        pid_dir: Option<PathBuf>,
    }

    impl MasterHandle for StubMaster {
        fn pid_dir(&self) -> Option<&Path> {
            self.pid_dir.as_deref()
        }

        fn resolve(&self, path: &Path) -> PathBuf {
            path.to_path_buf()
        }

        fn restart(&self, _signal: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn recording_registry(log: &Arc<Mutex<Vec<&'static str>>>) -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        for (aliases, tag) in [
            ("-s, --status, status", "status"),
            ("-r, --restart, restart", "restart"),
            ("-s, --shutdown, shutdown", "shutdown"),
        ] {
            let log = log.clone();
            registry.define(aliases, "recorded", move |_env| {
                log.lock().unwrap().push(tag);
                Ok(CommandAction::Exit(0))
            });
        }
        registry
    }

    fn master_with_dir(dir: &Path) -> StubMaster {
        StubMaster {
            pid_dir: Some(dir.to_path_buf()),
        }
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_missing_pid_dir_is_fatal() {
        let dispatcher = Dispatcher::new(builtin());
        let master = StubMaster { pid_dir: None };
        let err = dispatcher.dispatch(&master, &args(&["-h"])).unwrap_err();
        assert!(matches!(err, DispatchError::MissingPidDir));
    }

    #[test]
    fn test_no_tokens_is_no_command() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(builtin());
        let master = master_with_dir(dir.path());
        assert_eq!(dispatcher.dispatch(&master, &[]).unwrap(), Dispatch::NoCommand);
    }

    #[test]
    fn test_unknown_tokens_silently_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(recording_registry(&log));
        let master = master_with_dir(dir.path());

        let result = dispatcher
            .dispatch(&master, &args(&["--no-such-flag", "bogus"]))
            .unwrap();
        assert_eq!(result, Dispatch::NoCommand);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ambiguous_s_triggers_both_owners() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(recording_registry(&log));
        let master = master_with_dir(dir.path());

        let result = dispatcher.dispatch(&master, &args(&["-s"])).unwrap();
        assert_eq!(result, Dispatch::Exit(0));
        // both matched, invoked in registration order
        assert_eq!(*log.lock().unwrap(), vec!["status", "shutdown"]);
    }

    #[test]
    fn test_tokens_run_in_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(recording_registry(&log));
        let master = master_with_dir(dir.path());

        dispatcher
            .dispatch(&master, &args(&["--restart", "--status"]))
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["restart", "status"]);
    }

    #[test]
    fn test_first_exit_code_wins_but_all_handlers_run() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        {
            let log = log.clone();
            registry.define("-a, first", "exits 3", move |_env| {
                log.lock().unwrap().push("first");
                Ok(CommandAction::Exit(3))
            });
        }
        {
            let log = log.clone();
            registry.define("-a, second", "exits 0", move |_env| {
                log.lock().unwrap().push("second");
                Ok(CommandAction::Exit(0))
            });
        }

        let dispatcher = Dispatcher::new(registry);
        let master = master_with_dir(dir.path());
        let result = dispatcher.dispatch(&master, &args(&["-a"])).unwrap();
        assert_eq!(result, Dispatch::Exit(3));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_handler_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = CommandRegistry::new();
        registry.define("boom", "always fails", |_env| anyhow::bail!("broken handler"));

        let dispatcher = Dispatcher::new(registry);
        let master = master_with_dir(dir.path());
        let err = dispatcher.dispatch(&master, &args(&["boom"])).unwrap_err();
        assert!(matches!(err, DispatchError::Command(_)));
    }

    #[test]
    fn test_builtin_alias_table() {
        let registry = builtin();
        let aliases: Vec<Vec<&str>> = registry
            .commands()
            .iter()
            .map(|c| c.aliases().to_vec())
            .collect();
        assert_eq!(
            aliases,
            vec![
                vec!["-s", "--status", "status"],
                vec!["-r", "--restart", "restart"],
                vec!["-s", "--shutdown", "shutdown"],
                vec!["-S", "--stop", "stop"],
                vec!["-h", "--help", "help"],
                vec!["-v", "--version"],
            ]
        );
    }

    #[test]
    fn test_help_lists_every_command_once_in_order() {
        let registry = builtin();
        let help = render_help(registry.commands());

        let mut last = 0;
        for command in registry.commands() {
            let line = command.aliases().join(", ");
            let pos = help.find(&line).unwrap_or_else(|| panic!("{} missing from help", line));
            assert!(pos >= last, "{} listed out of order", line);
            assert_eq!(help.matches(&line).count(), 1, "{} listed more than once", line);
            last = pos;
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_cluster_status_classifies_alive_and_dead() {
        let dir = tempfile::tempdir().unwrap();

        let mut dead = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = dead.id();
        dead.wait().unwrap();

        pidfiles::write_pid(dir.path(), "master", std::process::id()).unwrap();
        pidfiles::write_pid(dir.path(), "worker.0", dead_pid).unwrap();

        let statuses = cluster_status(dir.path()).unwrap();
        assert_eq!(statuses.len(), 2);
        for status in statuses {
            match status.name.as_str() {
                "master" => assert_eq!(status.liveness, Liveness::Alive),
                "worker 0" => assert_eq!(status.liveness, Liveness::Dead),
                other => panic!("unexpected process {}", other),
            }
        }
    }

    #[test]
    fn test_cluster_status_unparseable_pidfile_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("master.pid"), "garbage").unwrap();
        assert!(cluster_status(dir.path()).is_err());
    }
}
