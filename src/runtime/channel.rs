use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::{
    runtime::Handle,
    sync::broadcast::{self, error::RecvError},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::{
    ProcwatchError, Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Message, TreeEvent},
    utils,
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().clone();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = handles.read().clone();
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

pub type TreeEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type TreeEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the repository name
    /// eg. prod-*
    pub repository: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            repository: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn with_repository(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
        }
    }
}

/// Fan-out point for tree events.
///
/// The poller publishes into the broadcast queue; `listen` forwards every
/// event to the registered handlers in publication order.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,

    events: ShareLock<Vec<TreeEventHandle>>,
    events_async: ShareLock<Vec<TreeEventHandleAsync>>,

    handle: Handle,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(
        capacity: usize,
        handle: Handle,
    ) -> Self {
        Self {
            event_queue: BroadcastQueue::new(capacity),
            events: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            handle,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Publishes an event about `repository`. Having no subscriber is not an error.
    pub(crate) fn emit(
        &self,
        repository: &str,
        event: TreeEvent,
    ) {
        let message = Message {
            repository: repository.to_string(),
            event,
            timestamp: utils::time::time_millis(),
        };
        let _ = self.event_queue.send(Event::new(&message));
    }

    /// Raw receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event<Message>> {
        self.event_queue.subscribe()
    }

    /// Events as a stream; lagging consumers get a `Lagged` item instead of blocking the poller.
    pub fn stream(&self) -> BroadcastStream<Event<Message>> {
        BroadcastStream::new(self.event_queue.subscribe())
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let events = self.events.clone();
        let events_async = self.events_async.clone();

        let shutdown = self.shutdown.clone();
        self.handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    received = event_queue.recv() => match received {
                        Ok(e) => {
                            let evt = e.clone();
                            dispatch_event!(events, &evt);
                            dispatch_event_async!(events_async, &e);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "tree event listener lagged behind");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("tree event listener stopped");
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Handler registration filtered by repository name.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: globset::GlobMatcher,
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        let glob = globset::Glob::new(&options.repository).map_err(|e| ProcwatchError::Config(format!("invalid repository pattern {}: {}", options.repository, e)))?;
        Ok(Self {
            channel,
            glob: glob.compile_matcher(),
        })
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.register(|_| true, f);
    }

    pub fn on_inserted(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.register(TreeEvent::is_inserted, f);
    }

    pub fn on_removed(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.register(TreeEvent::is_removed, f);
    }

    pub fn on_changed(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.register(TreeEvent::is_changed, f);
    }

    pub fn on_structure_changed(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.register(TreeEvent::is_structure_changed, f);
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        self.channel.events_async.write().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }

    fn register(
        &self,
        kind: fn(&TreeEvent) -> bool,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().push(Arc::new(move |e| {
            if kind(&e.event) && is_match(&glob, e) {
                f(e);
            }
        }));
    }
}

/// Root level events carry an empty repository name and reach every handler.
fn is_match(
    glob: &globset::GlobMatcher,
    e: &Event<Message>,
) -> bool {
    e.repository.is_empty() || glob.is_match(&e.repository)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::StreamExt;

    use super::*;
    use crate::events::TreePath;

    fn structure(repository: &str) -> TreeEvent {
        TreeEvent::StructureChanged {
            path: TreePath::Repository(repository.to_string()),
            children: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber_and_stream() {
        let channel = Channel::new(16, Handle::current());
        let mut rx = channel.subscribe();
        let mut stream = channel.stream();

        channel.emit("alpha", structure("alpha"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.repository, "alpha");
        assert!(received.event.is_structure_changed());

        let streamed = stream.next().await.unwrap().unwrap();
        assert_eq!(streamed.event.path(), &TreePath::Repository("alpha".to_string()));
    }

    #[tokio::test]
    async fn test_handlers_filter_by_kind_and_glob() {
        let channel = Arc::new(Channel::new(16, Handle::current()));
        channel.listen();

        let prod = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));
        let inserted = Arc::new(AtomicUsize::new(0));

        let counter = prod.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_repository("prod-*")).unwrap().on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = all.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_structure_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = inserted.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_inserted(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.emit("prod-eu", structure("prod-eu"));
        channel.emit("staging", structure("staging"));

        tokio::time::timeout(Duration::from_secs(2), async {
            while all.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(prod.load(Ordering::SeqCst), 1);
        assert_eq!(inserted.load(Ordering::SeqCst), 0);
        channel.shutdown();
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let channel = Arc::new(Channel::new(16, runtime.handle().clone()));
        let result = ChannelEvent::channel(channel, ChannelOptions::with_repository("prod-[")).map(|_| ());
        assert!(matches!(result, Err(ProcwatchError::Config(_))));
    }
}
