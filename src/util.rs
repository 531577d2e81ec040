use std::sync::atomic;
use std::thread;
use std::time;

use slog_scope::debug;

/// Upper bound on a single sleep, so a stop request is noticed mid-wait.
const SLEEP_SLICE: time::Duration = time::Duration::from_millis(250);

/// Yields immediately, then once per `period`, until `stop` is raised.
pub fn every<'a>(
    name: &'a str,
    period: time::Duration,
    stop: &'a atomic::AtomicBool,
) -> impl Iterator<Item = ()> + 'a {
    debug!("starting timer {:?}", name);
    let mut first = true;

    std::iter::from_fn(move || {
        if !first {
            let mut waited = time::Duration::from_secs(0);
            while waited < period {
                if stop.load(atomic::Ordering::Relaxed) {
                    debug!("timer {:?} stopped", name);
                    return None;
                }
                let step = SLEEP_SLICE.min(period - waited);
                thread::sleep(step);
                waited += step;
            }
        }
        first = false;

        if stop.load(atomic::Ordering::Relaxed) {
            debug!("timer {:?} stopped", name);
            return None;
        }

        debug!("timer tick {:?}", name);
        Some(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_immediate() {
        let stop = atomic::AtomicBool::new(false);
        // An hour-long period would hang the test if the first tick waited.
        let mut ticks = every("test", time::Duration::from_secs(3600), &stop);

        assert_eq!(ticks.next(), Some(()));
    }

    #[test]
    fn raised_stop_flag_ends_the_ticker() {
        let stop = atomic::AtomicBool::new(true);
        let mut ticks = every("test", time::Duration::from_millis(1), &stop);

        assert_eq!(ticks.next(), None);
    }

    #[test]
    fn stop_is_noticed_between_ticks() {
        let stop = atomic::AtomicBool::new(false);
        let mut ticks = every("test", time::Duration::from_millis(1), &stop);

        assert_eq!(ticks.next(), Some(()));
        stop.store(true, atomic::Ordering::Relaxed);
        assert_eq!(ticks.next(), None);
    }
}
