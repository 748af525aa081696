//! Channels between the escrow actors
//!
//! Every channel is an unbounded flume queue. Senders are wrapped in small
//! cloneable handles that name the peer they reach; receivers are wrapped in
//! an [`Inbox`] whose only receive method takes a deadline.

use std::time::Duration;

use crate::crypto::Envelope;

/// What can arrive on an escrow agent's inbound channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentMessage {
    /// The agent's share packet, sealed for the agent
    Deposit(Envelope),
    /// Release the stored share to the authority
    Authorize,
}

/// Sent by the depositor on its own channel once every share is out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositNotice {
    Completed {
        /// Number of agents the depositor managed to reach
        delivered: usize,
    },
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("nothing received within {0:?}")]
    Timeout(Duration),
    #[error("every sender has been dropped")]
    Closed,
}

/// Receiving half of a channel
#[derive(Debug)]
pub struct Inbox<T> {
    rx: flume::Receiver<T>,
}

impl<T> Inbox<T> {
    /// Wait for the next message, giving up after `deadline`
    pub async fn recv_within(&self, deadline: Duration) -> Result<T, ChannelError> {
        match tokio::time::timeout(deadline, self.rx.recv_async()).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => Err(ChannelError::Timeout(deadline)),
        }
    }

    /// Take a message if one is already queued
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create an unbounded channel, returning the raw sender and its inbox
pub fn channel<T>() -> (flume::Sender<T>, Inbox<T>) {
    let (tx, rx) = flume::unbounded();
    (tx, Inbox { rx })
}

/// Sending side of one escrow agent's private channel
///
/// Cloned into the depositor (for deposits) and the authority (for the
/// authorization broadcast).
#[derive(Debug, Clone)]
pub struct AgentHandle {
    index: u8,
    tx: flume::Sender<AgentMessage>,
}

impl AgentHandle {
    /// Create the channel for agent `index`
    pub fn new(index: u8) -> (Self, Inbox<AgentMessage>) {
        let (tx, inbox) = channel();
        (Self { index, tx }, inbox)
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Hand the agent its sealed share packet
    pub fn deposit(&self, envelope: Envelope) -> Result<(), ChannelError> {
        self.send(AgentMessage::Deposit(envelope))
    }

    /// Tell the agent to release its share
    pub fn authorize(&self) -> Result<(), ChannelError> {
        self.send(AgentMessage::Authorize)
    }

    fn send(&self, message: AgentMessage) -> Result<(), ChannelError> {
        self.tx.send(message).map_err(|_| ChannelError::Closed)
    }
}

/// Sending side of the authority's shared inbound channel
#[derive(Debug, Clone)]
pub struct AuthorityHandle {
    tx: flume::Sender<Envelope>,
}

impl AuthorityHandle {
    pub fn new() -> (Self, Inbox<Envelope>) {
        let (tx, inbox) = channel();
        (Self { tx }, inbox)
    }

    /// Forward a share packet sealed for the authority
    pub fn release(&self, envelope: Envelope) -> Result<(), ChannelError> {
        self.tx.send(envelope).map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (handle, inbox) = AgentHandle::new(1);
        handle.deposit(Envelope::from(vec![1])).unwrap();
        handle.authorize().unwrap();

        let deadline = Duration::from_millis(100);
        assert_eq!(
            inbox.recv_within(deadline).await.unwrap(),
            AgentMessage::Deposit(Envelope::from(vec![1]))
        );
        assert_eq!(
            inbox.recv_within(deadline).await.unwrap(),
            AgentMessage::Authorize
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_deadline() {
        let (_handle, inbox) = AgentHandle::new(1);
        let deadline = Duration::from_secs(5);
        assert_eq!(
            inbox.recv_within(deadline).await,
            Err(ChannelError::Timeout(deadline))
        );
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (handle, inbox) = AgentHandle::new(2);
        drop(handle);
        assert_eq!(
            inbox.recv_within(Duration::from_secs(1)).await,
            Err(ChannelError::Closed)
        );

        let (authority, inbox) = AuthorityHandle::new();
        drop(inbox);
        assert_eq!(
            authority.release(Envelope::from(vec![])),
            Err(ChannelError::Closed)
        );
    }

    #[tokio::test]
    async fn test_many_to_one() {
        let (authority, inbox) = AuthorityHandle::new();
        for i in 0..5u8 {
            authority.clone().release(Envelope::from(vec![i])).unwrap();
        }
        assert_eq!(inbox.len(), 5);
        assert_eq!(inbox.try_recv(), Some(Envelope::from(vec![0])));
    }
}
