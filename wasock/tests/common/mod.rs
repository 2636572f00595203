#![allow(dead_code)]

use std::collections::VecDeque;
use std::slice;

use wasock::fd::RawFd;
use wasock::poll::{Event, EventKind, Subscription, SubscriptionKind};
use wasock::sys::Host;
use wasock::sys::abi::{self, EVENT_SIZE, Errno, IOVEC_SIZE, SUBSCRIPTION_SIZE};

/// One host call, as seen by [`MockHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Accept { fd: RawFd, flags: u16 },
    Recv { fd: RawFd, iovs_len: usize, ri_flags: u16, capacity: usize },
    Send { fd: RawFd, si_flags: u16, data: Vec<u8> },
    Shutdown { fd: RawFd, how: u8 },
    Close { fd: RawFd },
    Datasync { fd: RawFd },
    Poll { nsubscriptions: usize, subscriptions: Vec<Subscription> },
}

/// What the mock answers to the next poll call.
#[derive(Debug, Clone)]
pub enum PollReply {
    Events(Vec<Event>),
    /// Raw event records and the count written to `nevents`.
    Raw { records: Vec<[u8; EVENT_SIZE]>, count: u32 },
    Fail(Errno),
}

/// A host that records every call and answers from queued replies.
///
/// Accepts and receives answer would-block once their queues run dry. Polls
/// without a queued reply fire every clock subscription of the batch.
#[derive(Debug, Default)]
pub struct MockHost {
    pub calls: Vec<Call>,
    pub accepts: VecDeque<Result<RawFd, Errno>>,
    pub receives: VecDeque<Result<Vec<u8>, Errno>>,
    pub polls: VecDeque<PollReply>,
    pub send_errno: Errno,
    pub shutdown_errno: Errno,
    pub close_errno: Errno,
    pub datasync_errno: Errno,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(mut self, fd: RawFd) -> Self {
        self.accepts.push_back(Ok(fd));
        self
    }

    pub fn receiving(mut self, data: &[u8]) -> Self {
        self.receives.push_back(Ok(data.to_vec()));
        self
    }

    pub fn failing_receive(mut self, errno: Errno) -> Self {
        self.receives.push_back(Err(errno));
        self
    }

    pub fn shutdowns(&self) -> Vec<(RawFd, u8)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Shutdown { fd, how } => Some((*fd, *how)),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<RawFd> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Close { fd } => Some(*fd),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<(RawFd, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Send { fd, data, .. } => Some((*fd, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn poll_calls(&self) -> Vec<(usize, Vec<Subscription>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Poll {
                    nsubscriptions,
                    subscriptions,
                } => Some((*nsubscriptions, subscriptions.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }
}

unsafe fn store(dst: *mut u8, bytes: &[u8]) {
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
}

impl Host for MockHost {
    unsafe fn sock_accept(&mut self, fd: RawFd, flags: u16, fd_out: *mut u8) -> Errno {
        self.calls.push(Call::Accept { fd, flags });

        match self.accepts.pop_front().unwrap_or(Err(abi::ERRNO_AGAIN)) {
            Ok(accepted) => {
                unsafe { store(fd_out, &accepted.to_le_bytes()) };
                abi::ERRNO_SUCCESS
            }
            Err(errno) => errno,
        }
    }

    unsafe fn sock_recv(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        ri_flags: u16,
        ro_datalen: *mut u8,
        ro_flags: *mut u8,
    ) -> Errno {
        let records = unsafe { slice::from_raw_parts(iovs, iovs_len * IOVEC_SIZE) };
        let (base, capacity) = abi::decode_iovec(&records[..IOVEC_SIZE]);

        self.calls.push(Call::Recv {
            fd,
            iovs_len,
            ri_flags,
            capacity,
        });

        match self.receives.pop_front().unwrap_or(Err(abi::ERRNO_AGAIN)) {
            Ok(data) => {
                let n = data.len().min(capacity);

                unsafe {
                    store(base as *mut u8, &data[..n]);
                    store(ro_datalen, &(n as u32).to_le_bytes());
                    store(ro_flags, &0u16.to_le_bytes());
                }

                abi::ERRNO_SUCCESS
            }
            Err(errno) => errno,
        }
    }

    unsafe fn sock_send(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        si_flags: u16,
        so_datalen: *mut u8,
    ) -> Errno {
        let records = unsafe { slice::from_raw_parts(iovs, iovs_len * IOVEC_SIZE) };
        let mut data = Vec::new();

        for record in records.chunks_exact(IOVEC_SIZE) {
            let (base, len) = abi::decode_iovec(record);
            data.extend_from_slice(unsafe { slice::from_raw_parts(base as *const u8, len) });
        }

        let n = data.len() as u32;
        self.calls.push(Call::Send { fd, si_flags, data });

        if self.send_errno != abi::ERRNO_SUCCESS {
            return self.send_errno;
        }

        unsafe { store(so_datalen, &n.to_le_bytes()) };

        abi::ERRNO_SUCCESS
    }

    fn sock_shutdown(&mut self, fd: RawFd, how: u8) -> Errno {
        self.calls.push(Call::Shutdown { fd, how });
        self.shutdown_errno
    }

    fn fd_close(&mut self, fd: RawFd) -> Errno {
        self.calls.push(Call::Close { fd });
        self.close_errno
    }

    fn fd_datasync(&mut self, fd: RawFd) -> Errno {
        self.calls.push(Call::Datasync { fd });
        self.datasync_errno
    }

    unsafe fn poll_oneoff(
        &mut self,
        subscriptions: *const u8,
        events: *mut u8,
        nsubscriptions: usize,
        nevents: *mut u8,
    ) -> Errno {
        let input = unsafe { slice::from_raw_parts(subscriptions, nsubscriptions * SUBSCRIPTION_SIZE) };
        let output = unsafe { slice::from_raw_parts_mut(events, nsubscriptions * EVENT_SIZE) };

        let decoded: Vec<Subscription> = input
            .chunks_exact(SUBSCRIPTION_SIZE)
            .map(|record| abi::decode_subscription(record).unwrap())
            .collect();

        self.calls.push(Call::Poll {
            nsubscriptions,
            subscriptions: decoded.clone(),
        });

        let reply = self.polls.pop_front().unwrap_or_else(|| {
            PollReply::Events(
                decoded
                    .iter()
                    .filter(|s| matches!(s.kind, SubscriptionKind::Clock(_)))
                    .map(|s| Event {
                        userdata: s.userdata,
                        error: abi::ERRNO_SUCCESS,
                        kind: EventKind::Clock,
                    })
                    .collect(),
            )
        });

        let count = match reply {
            PollReply::Events(list) => {
                for (record, event) in output.chunks_exact_mut(EVENT_SIZE).zip(&list) {
                    abi::encode_event(event, record);
                }
                list.len().min(nsubscriptions) as u32
            }
            PollReply::Raw { records, count } => {
                for (record, raw) in output.chunks_exact_mut(EVENT_SIZE).zip(&records) {
                    record.copy_from_slice(raw);
                }
                count
            }
            PollReply::Fail(errno) => return errno,
        };

        unsafe { store(nevents, &count.to_le_bytes()) };

        abi::ERRNO_SUCCESS
    }
}
