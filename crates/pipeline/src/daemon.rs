use std::time::Duration;

use anyhow::Result;
use gomoku_selfplay::Shutdown;
use log::{error, info};

/// Call `tick` every `interval` until `shutdown` fires.
///
/// A failing tick is logged and retried on the next interval.
pub fn run_periodic<F>(name: &str, interval: Duration, shutdown: &Shutdown, mut tick: F)
where
    F: FnMut() -> Result<()>,
{
    info!("[{name}] started, polling every {interval:?}");
    while !shutdown.is_triggered() {
        if let Err(e) = tick() {
            error!("[{name}] iteration failed, retrying in {interval:?}: {e:#}");
        }
        if shutdown.wait_timeout(interval) {
            break;
        }
    }
    info!("[{name}] stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_errors_do_not_stop_the_loop() {
        let shutdown = Shutdown::new();
        let mut calls = 0;
        run_periodic("test", Duration::from_millis(1), &shutdown, || {
            calls += 1;
            if calls == 3 {
                shutdown.trigger();
            }
            Err(anyhow!("transient"))
        });
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_triggered_shutdown_skips_work() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut calls = 0;
        run_periodic("test", Duration::from_secs(60), &shutdown, || {
            calls += 1;
            Ok(())
        });
        assert_eq!(calls, 0);
    }
}
