//! Role-to-role transport.
//!
//! The specification calls for "MPI or a functionally equivalent ordered
//! point-to-point transport". This crate realizes ranks as threads within
//! one process and wires them with dedicated `crossbeam-channel` endpoints
//! established once at job start, grounded on the worker-pool/channel
//! plumbing pattern in the teacher's old CSV record fanner. Swapping in a
//! real MPI binding later only means reimplementing [`Outbox`]/[`Inbox`]
//! over that transport; no role logic depends on threads versus processes.

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{PipelineError, Role};
use crate::message::{Message, Request};

/// The sending half of one ordered, FIFO link between two roles.
#[derive(Clone)]
pub struct Outbox<T> {
    tx: Sender<T>,
    owner: Role,
}

impl<T> Outbox<T> {
    pub fn send(&self, value: T) -> Result<(), PipelineError> {
        self.tx
            .send(value)
            .map_err(|_| PipelineError::transport(self.owner, "peer disconnected before receiving"))
    }
}

/// The receiving half of one ordered, FIFO link between two roles.
pub struct Inbox<T> {
    rx: Receiver<T>,
    owner: Role,
}

impl<T> Inbox<T> {
    pub fn recv(&self) -> Result<T, PipelineError> {
        self.rx
            .recv()
            .map_err(|_| PipelineError::transport(self.owner, "peer disconnected before sending"))
    }
}

fn link<T>(capacity: usize, owner_tx: Role, owner_rx: Role) -> (Outbox<T>, Inbox<T>) {
    let (tx, rx) = bounded(capacity);
    (Outbox { tx, owner: owner_tx }, Inbox { rx, owner: owner_rx })
}

/// The Dealer's view of the transport.
pub struct DealerChannels {
    pub requests: Inbox<Request>,
    pub worker_replies: Vec<Outbox<Message>>,
    pub outputter: Outbox<Message>,
}

/// One Worker's view of the transport.
pub struct WorkerChannels {
    pub rank: usize,
    pub requests: Outbox<Request>,
    pub dealer_replies: Inbox<Message>,
    pub farmer: Outbox<Message>,
    pub outputter: Outbox<Message>,
}

/// The Farmer's view of the transport.
pub struct FarmerChannels {
    pub inbox: Inbox<Message>,
    pub outputter: Outbox<Message>,
}

/// The Outputter's view of the transport.
pub struct OutputterChannels {
    pub inbox: Inbox<Message>,
}

/// All per-rank channel endpoints for one job, built once at startup.
pub struct JobChannels {
    pub dealer: DealerChannels,
    pub workers: Vec<WorkerChannels>,
    pub farmer: FarmerChannels,
    pub outputter: OutputterChannels,
}

impl JobChannels {
    /// Wire up a job with `num_workers` Worker ranks. `capacity` bounds
    /// every channel, so a slow downstream role applies real back-pressure
    /// to its upstream senders rather than letting memory grow unbounded.
    pub fn new(num_workers: usize, capacity: usize) -> Self {
        let (request_tx, request_rx) = bounded::<Request>(capacity);
        let (outputter_tx_shared, outputter_rx) = bounded::<Message>(capacity);
        let (farmer_tx_shared, farmer_rx) = bounded::<Message>(capacity);

        let mut worker_reply_boxes = Vec::with_capacity(num_workers);
        let mut workers = Vec::with_capacity(num_workers);

        for rank in 0..num_workers {
            let worker_role = Role::Worker(rank);
            let (reply_tx, reply_rx) = bounded::<Message>(capacity);
            worker_reply_boxes.push(Outbox { tx: reply_tx, owner: Role::Dealer });

            workers.push(WorkerChannels {
                rank,
                requests: Outbox { tx: request_tx.clone(), owner: worker_role },
                dealer_replies: Inbox { rx: reply_rx, owner: worker_role },
                farmer: Outbox { tx: farmer_tx_shared.clone(), owner: worker_role },
                outputter: Outbox { tx: outputter_tx_shared.clone(), owner: worker_role },
            });
        }

        let dealer = DealerChannels {
            requests: Inbox { rx: request_rx, owner: Role::Dealer },
            worker_replies: worker_reply_boxes,
            outputter: Outbox { tx: outputter_tx_shared.clone(), owner: Role::Dealer },
        };

        let farmer = FarmerChannels {
            inbox: Inbox { rx: farmer_rx, owner: Role::Farmer },
            outputter: Outbox { tx: outputter_tx_shared, owner: Role::Farmer },
        };

        let outputter = OutputterChannels { inbox: Inbox { rx: outputter_rx, owner: Role::Outputter } };

        Self { dealer, workers, farmer, outputter }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_request_reaches_dealer() {
        let job = JobChannels::new(2, 4);
        job.workers[0].requests.send(Request { requestor_rank: 0, max_bytes: 64 }).unwrap();
        let got = job.dealer.requests.recv().unwrap();
        assert_eq!(got.requestor_rank, 0);
    }

    #[test]
    fn dealer_reply_reaches_only_its_worker() {
        let job = JobChannels::new(2, 4);
        job.dealer.worker_replies[1].send(Message::End).unwrap();
        assert!(job.workers[1].dealer_replies.recv().unwrap().is_end());
    }

    #[test]
    fn outputter_inbox_fans_in_from_dealer_and_workers() {
        let job = JobChannels::new(1, 4);
        job.dealer.outputter.send(Message::End).unwrap();
        job.workers[0].outputter.send(Message::End).unwrap();
        assert!(job.outputter.inbox.recv().unwrap().is_end());
        assert!(job.outputter.inbox.recv().unwrap().is_end());
    }

    #[test]
    fn disconnected_peer_is_a_transport_error() {
        let (tx, rx) = link::<Message>(1, Role::Dealer, Role::Farmer);
        drop(rx);
        assert!(tx.send(Message::End).is_err());
    }
}
