use crate::constants::{BLOCKCHAIN_CHECK_INTERVAL, RESERVOIR_TIMEOUT};
use crate::error::{ChainError, Result};
use crate::time::create_timestamp;
use ahash::AHashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

//
// Dispatch shell between the external payment discovery service and the
// per-currency handlers. The discoverer feeds streamed transactions to the
// right handler and replays history on startup; a separate worker sweeps
// every handler once a minute. Handler internals live outside this crate.
//

/// Per-currency payment processing, implemented by the currency backends
pub trait CurrencyHandler: Send + Sync {
    /// Replay of historical transactions fetched during catch-up
    fn process_past_txs(&self, data: &[u8]);
    /// One streamed transaction from the discovery publisher
    fn process_incoming_tx(&self, data: &[u8]);
    /// Re-examine the latest block of the external chain
    fn check_latest_block(&self);
}

pub type HandlerMap = AHashMap<String, Arc<dyn CurrencyHandler>>;

/// A message from the discovery publisher, frame per element
pub type DiscoveryFrames = Vec<Vec<u8>>;

/// Blocking request/reply side of the discovery service
pub trait CatchupClient: Send {
    /// Request all transactions for `currency` since the unix time `since`
    fn request_past_txs(&mut self, currency: &str, since: u64) -> Result<Vec<u8>>;
}

/// Socket factory for the discovery service. Implementations connect the
/// subscription and request endpoints given at construction.
pub trait DiscoveryTransport {
    fn connect(
        &self,
        sub_addr: &str,
        req_addr: &str,
    ) -> Result<(mpsc::Receiver<DiscoveryFrames>, Box<dyn CatchupClient>)>;
}

/// The discovery dispatch worker
pub struct Discoverer {
    handlers: Arc<HandlerMap>,
    subscription: mpsc::Receiver<DiscoveryFrames>,
    catchup: Box<dyn CatchupClient>,
    stop_send: mpsc::Sender<()>,
    stop_recv: mpsc::Receiver<()>,
}

impl Discoverer {
    /// Connect the discovery sockets. Any socket setup failure surfaces as
    /// `NoConnectionsAvailable`.
    pub fn new(
        transport: &dyn DiscoveryTransport,
        sub_addr: &str,
        req_addr: &str,
        handlers: HandlerMap,
    ) -> Result<Discoverer> {
        let (subscription, catchup) = transport
            .connect(sub_addr, req_addr)
            .map_err(|_| ChainError::NoConnectionsAvailable)?;

        // in-process signalling pair so the poll loop can be interrupted
        // without racing the subscription stream
        let (stop_send, stop_recv) = mpsc::channel(1);

        Ok(Discoverer {
            handlers: Arc::new(handlers),
            subscription,
            catchup,
            stop_send,
            stop_recv,
        })
    }

    /// Run until `shutdown` fires: replay history, then poll the
    /// subscription, dispatching each two-frame message to its handler.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let Discoverer {
            handlers,
            mut subscription,
            mut catchup,
            stop_send,
            mut stop_recv,
        } = self;

        retrieve_past_txs(&handlers, catchup.as_mut());

        let poll_handlers = handlers.clone();
        let poll = tokio::spawn(async move {
            loop {
                // queued subscription traffic drains before a stop frame
                // is honoured, matching the poll order of the sockets
                tokio::select! {
                    biased;
                    frames = subscription.recv() => {
                        match frames {
                            Some(frames) => assign_handler(&poll_handlers, frames),
                            None => break, // publisher closed
                        }
                    }
                    _ = stop_recv.recv() => {
                        break;
                    }
                }
            }
            info!("stopped");
        });

        info!("started");

        let _ = shutdown.recv().await;

        // publish the stop frame, then wait for the poll loop to wind down
        let _ = stop_send.send(()).await;
        let _ = poll.await;
    }
}

// startup catch-up: ask for everything inside the reservoir window
fn retrieve_past_txs(handlers: &HandlerMap, catchup: &mut dyn CatchupClient) {
    let origin_time = create_timestamp() - RESERVOIR_TIMEOUT;

    for (currency, handler) in handlers.iter() {
        info!(
            "start to fetch possible {} txs since time at {}",
            currency, origin_time
        );
        match catchup.request_past_txs(currency, origin_time) {
            Ok(payload) => handler.process_past_txs(&payload),
            Err(err) => error!("failed to receive message: {}", err),
        }
    }
}

fn assign_handler(handlers: &HandlerMap, frames: DiscoveryFrames) {
    if frames.len() != 2 {
        error!("invalid message: {:?}", frames);
        return;
    }
    let currency = match String::from_utf8(frames[0].clone()) {
        Ok(currency) => currency,
        Err(_) => {
            error!("invalid currency frame: {:?}", frames[0]);
            return;
        }
    };
    match handlers.get(&currency) {
        Some(handler) => handler.process_incoming_tx(&frames[1]),
        None => error!("no handler for currency: {}", currency),
    }
}

/// Periodic worker that fans `check_latest_block` across every handler.
pub struct Checker {
    handlers: Arc<HandlerMap>,
}

impl Checker {
    pub fn new(handlers: Arc<HandlerMap>) -> Self {
        Checker { handlers }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(BLOCKCHAIN_CHECK_INTERVAL);
        // the first tick of a tokio interval fires immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    break;
                }
                _ = interval.tick() => {
                    check_all(&self.handlers).await;
                    info!("block check finished");
                }
            }
        }
    }
}

// one sweep: every handler on its own task, wait for all of them
async fn check_all(handlers: &HandlerMap) {
    let mut tasks = Vec::with_capacity(handlers.len());
    for handler in handlers.values() {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            handler.check_latest_block();
        }));
    }
    futures::future::join_all(tasks).await;
}
