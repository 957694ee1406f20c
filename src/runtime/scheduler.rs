//! Thread-per-node scheduler for streaming graphs
//!
//! Spawns a dedicated thread for each node and manages their lifecycle.
//!
//! ## Threading Models
//!
//! 1. **Regular nodes**: Scheduler calls `work()` repeatedly in a loop. The stop
//!    signal is checked before every call, so a node that handles one unit per
//!    call (the nRF24 decoder handles one CSN transaction) is cancelled between
//!    units and never in the middle of one.
//!
//! 2. **Self-threading nodes**: Node manages its own worker threads internally. Scheduler calls
//!    `work()` once to start the node, then waits for `should_stop()` to signal completion.
//!    The node returns `is_self_threading() = true` to indicate this pattern.
//!
//! Example self-threading node: `DslFileSource` spawns per-channel reader threads internally.

use super::errors::WorkError;
use super::node::ProcessNode;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver as StdReceiver, Sender as StdSender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Cloneable handle for requesting cooperative shutdown from any thread
#[derive(Clone, Debug)]
pub struct StopHandle {
    signal: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask every node to stop at its next cancellation point
    pub fn stop(&self) {
        self.signal.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.load(Ordering::Relaxed)
    }
}

/// Runtime scheduler that executes a streaming graph
pub struct Scheduler {
    threads: Vec<(String, JoinHandle<()>)>,
    stop_signal: Arc<AtomicBool>,
    completion_tx: StdSender<String>,
    completion_rx: StdReceiver<String>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = channel();
        Self {
            threads: Vec::new(),
            stop_signal: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx,
        }
    }

    /// Handle that can stop this scheduler's nodes from another thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            signal: Arc::clone(&self.stop_signal),
        }
    }

    /// Start a process node in its own thread
    pub fn start_process(&mut self, mut node: Box<dyn ProcessNode>) {
        let stop_signal = Arc::clone(&self.stop_signal);
        let completion_tx = self.completion_tx.clone();
        let name = node.name().to_string();
        let thread_name = name.clone();

        debug!("Starting process node: {}", name);

        let handle = thread::spawn(move || {
            if node.is_self_threading() {
                // Self-threading node: call work() once to start internal threads
                if let Err(e) = node.work() {
                    error!(
                        "[{}] Failed to start self-threading node: {}",
                        thread_name, e
                    );
                } else {
                    loop {
                        if stop_signal.load(Ordering::Relaxed) {
                            info!(
                                "[{}] Stop signal received, shutting down self-threading node",
                                thread_name
                            );
                            break;
                        }
                        if node.should_stop() {
                            info!("[{}] Self-threading node completed", thread_name);
                            break;
                        }
                        thread::sleep(Duration::from_millis(50));
                    }
                }
            } else {
                let mut items_produced = 0usize;

                loop {
                    if stop_signal.load(Ordering::Relaxed) || node.should_stop() {
                        break;
                    }

                    match node.work() {
                        Ok(n) => items_produced += n,
                        Err(WorkError::Shutdown) => {
                            debug!("[{}] Input exhausted", thread_name);
                            break;
                        }
                        Err(e) => {
                            error!("[{}] Work error: {}", thread_name, e);
                            break;
                        }
                    }
                }

                info!(
                    "[{}] Shutdown. Produced {} items.",
                    thread_name, items_produced
                );
            }

            // Dropping the node closes its channels and releases trace readers
            drop(node);

            let _ = completion_tx.send(thread_name);
        });

        self.threads.push((name, handle));
    }

    /// Signal all nodes to stop
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }

    /// Wait for all node threads to complete
    ///
    /// Joins threads in the order they report completion.
    pub fn wait(self) {
        let Scheduler {
            threads,
            completion_tx,
            completion_rx,
            ..
        } = self;

        // The channel closes once every thread has dropped its clone
        drop(completion_tx);

        let total_threads = threads.len();
        let mut completed = 0;

        info!("Waiting for {} threads to complete...", total_threads);

        let mut threads_by_name: HashMap<String, JoinHandle<()>> = threads.into_iter().collect();

        while completed < total_threads {
            let Ok(thread_name) = completion_rx.recv() else {
                break;
            };
            completed += 1;
            if let Some(handle) = threads_by_name.remove(&thread_name) {
                match handle.join() {
                    Ok(_) => info!(
                        "[{}] Thread completed ({}/{})",
                        thread_name, completed, total_threads
                    ),
                    Err(e) => error!(
                        "[{}] Thread panicked ({}/{}): {:?}",
                        thread_name, completed, total_threads, e
                    ),
                }
            }
        }

        // A panicking node never reports completion
        for (thread_name, handle) in threads_by_name {
            if handle.join().is_err() {
                error!("[{}] Thread panicked", thread_name);
            }
        }

        info!("All {} threads completed", total_threads);
    }

    /// Get the number of running threads
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Get the names of all running threads
    pub fn thread_names(&self) -> Vec<String> {
        self.threads.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
