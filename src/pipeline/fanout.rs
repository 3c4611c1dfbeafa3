// src/pipeline/fanout.rs
//
// Broadcasts each frame snapshot to every registered consumer.
// Dispatch is one scoped thread per consumer, joined before the next
// frame is queued: parallel workers, serialized barriers. A failing or
// panicking consumer is reported and never blocks the barrier or
// corrupts another consumer.

use crate::pipeline::snapshot::FrameSnapshot;
use anyhow::Result;
use std::thread;
use tracing::warn;

pub trait FrameConsumer: Send {
    fn name(&self) -> &str;

    /// Called once per frame, strictly in frame order for this consumer.
    fn on_frame(&mut self, snapshot: &FrameSnapshot) -> Result<()>;

    /// Session end. Consumers flush whatever they are holding.
    fn on_finalize(&mut self) -> Result<()>;
}

#[derive(Default)]
pub struct FanOut {
    consumers: Vec<Box<dyn FrameConsumer>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, consumer: Box<dyn FrameConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Delivers the snapshot to every consumer and waits for all of
    /// them before returning.
    pub fn dispatch(&mut self, snapshot: &FrameSnapshot) {
        let frame_id = snapshot.frame_id;
        thread::scope(|s| {
            let handles: Vec<_> = self
                .consumers
                .iter_mut()
                .map(|consumer| {
                    s.spawn(move || {
                        let name = consumer.name().to_string();
                        (name, consumer.on_frame(snapshot))
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok((_, Ok(()))) => {}
                    Ok((name, Err(e))) => {
                        warn!("consumer '{}' failed on frame {}: {:#}", name, frame_id, e);
                    }
                    Err(_) => {
                        warn!("a consumer panicked on frame {}", frame_id);
                    }
                }
            }
        });
    }

    /// Broadcasts the finalize event with the same isolation rules.
    pub fn finalize(&mut self) {
        thread::scope(|s| {
            let handles: Vec<_> = self
                .consumers
                .iter_mut()
                .map(|consumer| {
                    s.spawn(move || {
                        let name = consumer.name().to_string();
                        (name, consumer.on_finalize())
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok((_, Ok(()))) => {}
                    Ok((name, Err(e))) => {
                        warn!("consumer '{}' failed at finalize: {:#}", name, e);
                    }
                    Err(_) => warn!("a consumer panicked at finalize"),
                }
            }
        });
    }
}
