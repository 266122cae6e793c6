// In-memory link for driving the transport without a socket

use std::collections::VecDeque;

use crate::transport::connection::{Link, LinkEvent, TransportError};
use crate::transport::protocol::{Channel, Record};

#[derive(Default)]
pub struct LoopbackLink {
    inbound: VecDeque<LinkEvent>,
    sent: Vec<(Channel, Vec<u8>)>,
    advertise_count: u32,
    fail_advertising: bool,
    fail_sends: bool,
}

impl LoopbackLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&mut self, event: LinkEvent) {
        self.inbound.push_back(event);
    }

    pub fn sent(&self) -> &[(Channel, Vec<u8>)] {
        &self.sent
    }

    /// Decoded records sent so far, draining the buffer
    pub fn take_records(&mut self) -> Vec<Record> {
        self.sent
            .drain(..)
            .map(|(_, payload)| Record::decode(&payload).unwrap())
            .collect()
    }

    pub fn advertise_count(&self) -> u32 {
        self.advertise_count
    }

    pub fn fail_advertising(&mut self, fail: bool) {
        self.fail_advertising = fail;
    }

    pub fn fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }
}

impl Link for LoopbackLink {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        if self.fail_advertising {
            return Err(TransportError::ChannelClosed);
        }
        self.advertise_count += 1;
        Ok(())
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.inbound.pop_front()
    }

    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::NotConnected);
        }
        self.sent.push((channel, payload.to_vec()));
        Ok(())
    }
}
