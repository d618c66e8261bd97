//! One-shot child to parent reporting.
//!
//! A [`Reporter`] is handed to a child at construction; the parent keeps the
//! matching [`Subscription`]. Publishing consumes the reporter, so a value can
//! be reported at most once.

use futures::channel::oneshot;

/// Whether a reported value has arrived yet.
#[derive(Clone, Debug, PartialEq)]
pub enum Availability<T> {
    Unready,
    Ready(T),
}

impl<T> Availability<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Availability::Ready(_))
    }
}

#[derive(Debug)]
pub struct Reporter<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Reporter<T> {
    /// Sends `value` to the subscription. Reporting into a dropped
    /// subscription is not an error; the value is discarded.
    pub fn publish(self, value: T) {
        if self.sender.send(value).is_err() {
            log::debug!("Report dropped: the subscriber is gone.");
        }
    }
}

#[derive(Debug)]
pub struct Subscription<T> {
    receiver: Option<oneshot::Receiver<T>>,
    state: Availability<T>,
}

impl<T> Subscription<T> {
    /// Pulls a published value, if any, into the subscription state. Returns
    /// `true` exactly once, on the poll that observed the transition.
    pub fn poll(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        match receiver.try_recv() {
            Ok(Some(value)) => {
                self.state = Availability::Ready(value);
                self.receiver = None;
                true
            }
            Ok(None) => false,
            // Reporter dropped without publishing; nothing will ever arrive.
            Err(oneshot::Canceled) => {
                self.receiver = None;
                false
            }
        }
    }

    pub fn availability(&self) -> &Availability<T> {
        &self.state
    }
}

/// Creates a connected reporter and subscription pair.
pub fn report_channel<T>() -> (Reporter<T>, Subscription<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        Reporter { sender },
        Subscription {
            receiver: Some(receiver),
            state: Availability::Unready,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unready() {
        let (_reporter, mut subscription) = report_channel::<u32>();
        assert!(!subscription.poll());
        assert_eq!(subscription.availability(), &Availability::Unready);
    }

    #[test]
    fn publish_is_observed_once() {
        let (reporter, mut subscription) = report_channel();
        reporter.publish(7);

        assert!(subscription.poll());
        assert!(!subscription.poll());
        assert_eq!(subscription.availability(), &Availability::Ready(7));
    }

    #[test]
    fn dropped_reporter_stays_unready() {
        let (reporter, mut subscription) = report_channel::<u32>();
        drop(reporter);

        assert!(!subscription.poll());
        assert!(!subscription.availability().is_ready());
    }

    #[test]
    fn publishing_without_subscriber_is_silent() {
        let (reporter, subscription) = report_channel();
        drop(subscription);
        reporter.publish("ignored");
    }
}
