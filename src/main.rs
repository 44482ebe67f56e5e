use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use herd_core::cli::{self, Dispatch, Dispatcher};
use herd_core::config::GlobalConfig;
use herd_core::master::{ClusterMaster, MasterHandle};
use herd_core::pidfiles;
use herd_core::reload::{ReloadOptions, ReloadWatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = GlobalConfig::load()?;
    let master = Arc::new(ClusterMaster::new(&cfg.root, &cfg.pid_dir));

    // The same binary is both the master and its control CLI: any recognized
    // command token makes this invocation an exit-action.
    let args: Vec<String> = std::env::args().skip(1).collect();
    let dispatcher = Dispatcher::new(cli::builtin());
    match dispatcher.dispatch(master.as_ref(), &args)? {
        Dispatch::Exit(code) => std::process::exit(code),
        Dispatch::NoCommand => {}
    }

    tracing::info!("herd master starting (pid {})", std::process::id());
    pidfiles::write_pid(master.pid_dir_path(), "master", std::process::id())?;

    let _watch = match &cfg.reload {
        Some(reload) => {
            let options = ReloadOptions {
                signal: reload.signal.clone(),
                interval: Duration::from_millis(reload.interval_ms),
            };
            let paths: Vec<PathBuf> = reload.paths.iter().map(PathBuf::from).collect();
            let watcher = ReloadWatcher::new(paths, options)?;
            Some(watcher.install(master.clone() as Arc<dyn MasterHandle>).await)
        }
        None => None,
    };

    run_signal_loop(master).await
}

/// Park the master on its control signals. SIGUSR2 restarts workers through
/// the master handle; SIGQUIT, SIGTERM and Ctrl+C end the daemon. Worker
/// supervision itself lives outside this process.
#[cfg(unix)]
async fn run_signal_loop(master: Arc<ClusterMaster>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut term = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = usr2.recv() => {
                tracing::info!("SIGUSR2 received, restarting workers");
                if let Err(e) = master.restart("SIGTERM") {
                    tracing::error!("worker restart failed: {}", e);
                }
            }
            _ = quit.recv() => {
                tracing::info!("SIGQUIT received, shutting down gracefully");
                break;
            }
            _ = term.recv() => {
                tracing::info!("SIGTERM received, shutting down");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn run_signal_loop(_master: Arc<ClusterMaster>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    Ok(())
}
