use std::sync::Arc;
use std::sync::mpsc::Sender;

use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::domain::{Command, Message, Reply, Request};
use crate::gateway::Gateway;

/// Runs gateway requests on the tokio runtime and posts the replies back to
/// the UI thread. Nothing here blocks the caller.
pub struct Dispatcher<G> {
    gateway: Arc<G>,
    handle: Handle,
    replies: Sender<Message>,
}

impl<G> Dispatcher<G>
where
    G: Gateway + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<G>, handle: Handle, replies: Sender<Message>) -> Self {
        Self {
            gateway,
            handle,
            replies,
        }
    }

    pub fn dispatch(&self, command: Command) {
        let gateway = Arc::clone(&self.gateway);
        let replies = self.replies.clone();
        let Command { ticket, request } = command;
        debug!("Dispatch {request:?} for {ticket:?}");

        self.handle.spawn(async move {
            let reply = match request {
                Request::FetchRecords => Reply::Records(gateway.fetch_records().await),
                Request::FetchAggregates => Reply::Aggregates(gateway.fetch_aggregates().await),
                Request::Submit(record) => Reply::Submitted(gateway.submit_record(&record).await),
                Request::Login(credentials) => {
                    Reply::LoggedIn(gateway.authenticate(&credentials).await)
                }
                Request::SignIn(credentials) => {
                    Reply::SignedIn(gateway.sign_in(&credentials).await)
                }
            };
            if replies.send(Message::Reply(ticket, reply)).is_err() {
                trace!("UI is gone, dropping reply for {ticket:?}");
            }
        });
    }

    pub fn dispatch_all(&self, commands: Vec<Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }
}
