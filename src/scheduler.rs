use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::action::Action;

/// The refresh and heartbeat timers. Both stop when the scheduler is stopped
/// or dropped, or when nobody is listening for their actions any more.
#[derive(Debug)]
pub struct Scheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(
        tx: UnboundedSender<Action>,
        refresh_every: Duration,
        heartbeat_every: Duration,
    ) -> Self {
        tracing::info!(?refresh_every, ?heartbeat_every, "Starting timers");
        Self {
            tasks: vec![
                tokio::spawn(repeat(tx.clone(), refresh_every, Action::Refresh)),
                tokio::spawn(repeat(tx, heartbeat_every, Action::Heartbeat)),
            ],
        }
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn repeat(tx: UnboundedSender<Action>, every: Duration, action: Action) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the app already loaded on start.
    interval.tick().await;

    loop {
        interval.tick().await;
        if tx.send(action.clone()).is_err() {
            tracing::debug!(?action, "Receiver gone, timer exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn timers_fire_on_their_own_cadence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _scheduler = Scheduler::start(tx, Duration::from_secs(30), Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(301)).await;

        let mut refreshes = 0;
        let mut heartbeats = 0;
        while let Ok(action) = rx.try_recv() {
            match action {
                Action::Refresh => refreshes += 1,
                Action::Heartbeat => heartbeats += 1,
                other => panic!("unexpected action {other:?}"),
            }
        }
        assert_eq!(refreshes, 10);
        assert_eq!(heartbeats, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_before_the_first_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _scheduler = Scheduler::start(tx, Duration::from_secs(30), Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_scheduler_sends_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::start(tx, Duration::from_secs(1), Duration::from_secs(1));
        scheduler.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
    }
}
