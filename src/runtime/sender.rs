//! Broadcast sender and end-of-stream signaling

use crossbeam_channel::{SendError, Sender as CrossbeamSender, bounded, unbounded};

use super::receiver::Receiver;

/// Channel message wrapper for end-of-stream signaling
///
/// Sources that hand cloned senders to worker threads cannot rely on
/// dropping a handle to close the channel, so they send `EndOfStream`
/// explicitly. Nodes never see this enum: `Sender::send()` wraps values and
/// `Receiver::recv()` unwraps them.
#[derive(Clone, Debug)]
pub enum ChannelMessage<T> {
    /// A data item
    Sample(T),
    /// No more data will be sent
    EndOfStream,
}

/// Sender that delivers every value to one or more consumers
pub struct Sender<T> {
    destinations: Vec<CrossbeamSender<ChannelMessage<T>>>,
}

impl<T: Clone> Sender<T> {
    /// Create a new Sender from a vector of crossbeam senders
    pub fn new(destinations: Vec<CrossbeamSender<ChannelMessage<T>>>) -> Self {
        Self { destinations }
    }

    /// Add another destination to this broadcast sender
    pub fn add_destination(&mut self, destination: CrossbeamSender<ChannelMessage<T>>) {
        self.destinations.push(destination);
    }

    /// Split into one sender per destination, so a source can feed each
    /// consumer from its own thread.
    pub fn split_senders(&self) -> Vec<Sender<T>> {
        self.destinations
            .iter()
            .map(|dest| Sender {
                destinations: vec![dest.clone()],
            })
            .collect()
    }

    /// Get the number of broadcast destinations
    pub fn num_destinations(&self) -> usize {
        self.destinations.len()
    }

    /// Send a value to all destinations
    ///
    /// Fails only if every destination has disconnected.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        if self.destinations.is_empty() {
            return Ok(());
        }

        let mut any_success = false;
        let mut last_error = None;

        for dest in &self.destinations {
            match dest.send(ChannelMessage::Sample(value.clone())) {
                Ok(()) => any_success = true,
                Err(SendError(msg)) => {
                    if let ChannelMessage::Sample(v) = msg {
                        last_error = Some(SendError(v));
                    }
                }
            }
        }

        if !any_success && let Some(e) = last_error {
            return Err(e);
        }

        Ok(())
    }

    /// Signal end-of-stream to all destinations
    ///
    /// Downstream `Receiver`s return `WorkError::Shutdown` once they have
    /// drained everything sent before this call.
    pub fn close(&self) {
        for dest in &self.destinations {
            let _ = dest.send(ChannelMessage::EndOfStream);
        }
    }

    /// Check if this sender has any connected receivers
    pub fn is_connected(&self) -> bool {
        !self.destinations.is_empty()
    }
}

impl<T: Clone> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            destinations: self.destinations.clone(),
        }
    }
}

/// Create a connected sender/receiver pair
///
/// `capacity` of `None` gives an unbounded channel, which is what recorded
/// traces use so a single thread can fill the channel before decoding.
pub fn channel<T: Clone>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = match capacity {
        Some(n) => bounded::<ChannelMessage<T>>(n),
        None => unbounded::<ChannelMessage<T>>(),
    };
    (Sender::new(vec![tx]), Receiver::new(rx))
}
