//! Join/Derivation Pipeline.
//!
//! A [`DerivedFeed`] is either **Idle** (no subscribers, no store
//! subscriptions) or **Live** (one background task holding a subscription
//! to each of the three input collections). The task keeps the latest
//! snapshot of every input and, whenever any of them emits, recomputes the
//! whole sales-call list from all three and publishes it on a `watch`
//! channel shared by every subscriber.
//!
//! ```text
//!  customers ─┐
//!  callLogs  ─┼─► combine-latest ─► derive_sales_calls ─► watch ─► subscribers
//!  sales     ─┘
//! ```
//!
//! The three input subscriptions plus the latest snapshots form a *chain*.
//! [`DerivedFeed::refresh`] tears the chain down and opens a new one inside
//! the same task, so current subscribers move onto it and at most one
//! chain is ever open.
//!
//! The feed goes back to Idle when its last subscriber is dropped, or when
//! an input stream fails or the task panics. A failure is delivered to
//! every subscriber as a final `Err`; nothing reconnects automatically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::stream::{self, BoxStream, StreamExt};
use salesdesk_store::{Collection, CollectionSnapshot, RecordStore, StoreError};
use tokio::sync::watch;

use crate::clock::Clock;
use crate::derive::{derive_sales_calls, DeriveSettings, SalesCall};
use crate::model::{decode_call_logs, decode_customers, decode_sales, CallLog, Customer, Sale};

/// One full derived list, shared between subscribers.
pub type DerivedList = Arc<Vec<SalesCall>>;

/// Live stream of full derived lists. An `Err` item is terminal.
pub type DerivedStream = BoxStream<'static, Result<DerivedList, StoreError>>;

#[derive(Debug, Clone)]
enum Frame {
    /// The current chain has not heard from every input yet.
    Warming,
    Ready(DerivedList),
    Failed(StoreError),
}

/// The task owns the only strong reference to the sender.
enum FeedState {
    Idle,
    Live { tx: Weak<watch::Sender<Frame>> },
}

impl FeedState {
    fn sender(&self) -> Option<Arc<watch::Sender<Frame>>> {
        match self {
            FeedState::Idle => None,
            FeedState::Live { tx } => tx.upgrade(),
        }
    }

    fn is(&self, tx: &Arc<watch::Sender<Frame>>) -> bool {
        matches!(self, FeedState::Live { tx: current } if current.as_ptr() == Arc::as_ptr(tx))
    }
}

/// State shared between the feed handle and its task.
struct Shared {
    state: Mutex<FeedState>,
    /// Bumped by every refresh. A chain only publishes while its epoch is
    /// current.
    epoch: watch::Sender<u64>,
    recomputes: AtomicU64,
    chains: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the pipeline task needs besides its channel.
struct Inputs {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    settings: DeriveSettings,
}

/// Shared, lazily started sales-call feed.
pub struct DerivedFeed {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    settings: DeriveSettings,
    shared: Arc<Shared>,
}

impl DerivedFeed {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, settings: DeriveSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            shared: Arc::new(Shared {
                state: Mutex::new(FeedState::Idle),
                epoch: watch::channel(0).0,
                recomputes: AtomicU64::new(0),
                chains: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to the derived list.
    ///
    /// The first subscriber starts the pipeline task, so this must be called
    /// from within a tokio runtime. Later subscribers share it and start
    /// with the most recent list, if one has been computed.
    pub fn subscribe(&self) -> DerivedStream {
        let mut rx = {
            let mut state = self.shared.lock();
            match state.sender() {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = watch::channel(Frame::Warming);
                    let tx = Arc::new(tx);
                    *state = FeedState::Live {
                        tx: Arc::downgrade(&tx),
                    };
                    let inputs = Inputs {
                        store: self.store.clone(),
                        clock: self.clock.clone(),
                        settings: self.settings.clone(),
                    };
                    tokio::spawn(run(inputs, tx, self.shared.clone()));
                    tracing::debug!("derived feed live");
                    rx
                }
            }
        };
        rx.mark_changed();
        frames(rx)
    }

    /// Discard the current chain and derive again from fresh snapshots.
    ///
    /// Subscribers stay attached and see no list from the old chain after
    /// this returns. A no-op while Idle, since the next subscriber opens a
    /// fresh chain anyway.
    pub fn refresh(&self) {
        let state = self.shared.lock();
        self.shared.epoch.send_modify(|epoch| *epoch += 1);
        if let Some(tx) = state.sender() {
            let _previous = tx.send_replace(Frame::Warming);
            tracing::debug!("derived feed refreshing");
        }
    }

    /// Whether the pipeline task is running.
    pub fn is_live(&self) -> bool {
        self.shared.lock().sender().is_some()
    }

    /// Number of full recomputations performed so far.
    pub fn recompute_count(&self) -> u64 {
        self.shared.recomputes.load(Ordering::Relaxed)
    }

    /// Number of input chains opened so far.
    pub fn chain_count(&self) -> u64 {
        self.shared.chains.load(Ordering::Relaxed)
    }
}

fn frames(rx: watch::Receiver<Frame>) -> DerivedStream {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        loop {
            rx.changed().await.ok()?;
            let frame = rx.borrow_and_update().clone();
            match frame {
                Frame::Warming => continue,
                Frame::Ready(list) => return Some((Ok(list), Some(rx))),
                Frame::Failed(e) => return Some((Err(e), None)),
            }
        }
    })
    .boxed()
}

/// Latest decoded snapshot of each input.
#[derive(Default)]
struct Latest {
    customers: Option<Vec<Customer>>,
    call_logs: Option<Vec<CallLog>>,
    sales: Option<Vec<Sale>>,
}

type Item = Option<Result<CollectionSnapshot, StoreError>>;

/// Fails the feed if the task unwinds.
struct PanicGuard {
    tx: Arc<watch::Sender<Frame>>,
    shared: Arc<Shared>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let error = StoreError::Unavailable("derived feed task panicked".to_string());
            fail(&self.tx, &self.shared, None, error);
        }
    }
}

async fn run(inputs: Inputs, tx: Arc<watch::Sender<Frame>>, shared: Arc<Shared>) {
    let guard = PanicGuard { tx, shared };
    let (tx, shared) = (&guard.tx, &guard.shared);
    let mut epoch = shared.epoch.subscribe();

    'chain: loop {
        let chain = *epoch.borrow_and_update();
        let opened = shared.chains.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(chain, opened, "derivation chain opened");

        let mut customers = inputs.store.subscribe(Collection::Customers);
        let mut call_logs = inputs.store.subscribe(Collection::CallLogs);
        let mut sales = inputs.store.subscribe(Collection::Sales);
        let mut latest = Latest::default();

        loop {
            let (collection, item): (Collection, Item) = tokio::select! {
                item = customers.next() => (Collection::Customers, item),
                item = call_logs.next() => (Collection::CallLogs, item),
                item = sales.next() => (Collection::Sales, item),
                Ok(()) = epoch.changed() => continue 'chain,
                () = tx.closed() => {
                    if retire_if_unused(tx, shared) {
                        return;
                    }
                    continue;
                }
            };

            let snapshot = match item {
                Some(Ok(snapshot)) => snapshot,
                Some(Err(e)) => return fail(tx, shared, Some(collection), e),
                None => {
                    let e = StoreError::Unavailable(format!("{collection} subscription ended"));
                    return fail(tx, shared, Some(collection), e);
                }
            };

            match collection {
                Collection::Customers => latest.customers = Some(decode_customers(&snapshot)),
                Collection::CallLogs => latest.call_logs = Some(decode_call_logs(&snapshot)),
                Collection::Sales => latest.sales = Some(decode_sales(&snapshot)),
            }

            let (Some(c), Some(l), Some(s)) = (&latest.customers, &latest.call_logs, &latest.sales)
            else {
                continue;
            };
            let list = derive_sales_calls(c, l, s, inputs.clock.now(), &inputs.settings);
            shared.recomputes.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(trigger = %collection, rows = list.len(), "sales calls recomputed");

            let current = {
                let _state = shared.lock();
                let current = *epoch.borrow() == chain;
                if current {
                    let _previous = tx.send_replace(Frame::Ready(Arc::new(list)));
                }
                current
            };
            if !current {
                continue 'chain;
            }
        }
    }
}

/// Go Idle if nobody is listening. Returns false if a subscriber slipped in.
fn retire_if_unused(tx: &Arc<watch::Sender<Frame>>, shared: &Shared) -> bool {
    let mut state = shared.lock();
    if !state.is(tx) {
        return true;
    }
    if tx.receiver_count() > 0 {
        return false;
    }
    *state = FeedState::Idle;
    tracing::debug!("derived feed idle");
    true
}

fn fail(
    tx: &Arc<watch::Sender<Frame>>,
    shared: &Shared,
    collection: Option<Collection>,
    error: StoreError,
) {
    let mut state = shared.lock();
    match collection {
        Some(collection) => {
            tracing::warn!(%collection, %error, "input stream failed; closing derived feed");
        }
        None => tracing::error!(%error, "closing derived feed"),
    }
    let _previous = tx.send_replace(Frame::Failed(error));
    if state.is(tx) {
        *state = FeedState::Idle;
    }
}
