//! Event stream engine - main traversal logic
//!
//! This module contains the loop that follows one feed, including:
//! - Choosing and waiting for the next eligible fragment
//! - Fetching, parsing and reading metadata of each fragment
//! - Scheduling relation targets and polling re-fetches
//! - Realizing members and buffering the resulting records
//! - Pause, resume, destroy and checkpoint export/import

use crate::config::OutputRepresentation;
use crate::metadata::{FeedMetadata, Relation};
use crate::output::StreamStats;
use crate::rdf::nquads::JSON_LD;
use crate::rdf::{vocab, Quad};
use crate::state::StreamState;
use crate::stream::bookkeeper::FragmentBookkeeper;
use crate::stream::cache_policy::polling_ttl;
use crate::stream::checkpoint::Checkpoint;
use crate::stream::collaborators::Collaborators;
use crate::stream::dedup::DedupCache;
use crate::stream::members::{dereference_member, parse_timestamp, MemberCandidate, MemberExtractor};
use crate::stream::options::StreamOptions;
use crate::stream::rate_limiter::RateLimiter;
use crate::stream::record::Record;
use crate::stream::{Delivery, StreamControl, StreamEvent};
use crate::{Result, TideError};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Capacity of the notification channel
const EVENT_CAPACITY: usize = 1024;

/// Returns true if a relation can be skipped because everything behind it
/// predates `from_time`
fn is_pruned(relation: &Relation, from_time: Option<DateTime<Utc>>) -> bool {
    let Some(from_time) = from_time else {
        return false;
    };
    relation.primary_type() == Some(vocab::TREE_LESS_THAN_RELATION)
        && relation
            .values
            .first()
            .and_then(|v| parse_timestamp(v))
            .is_some_and(|value| value <= from_time)
}

/// A long-lived follower of one event stream
///
/// Records are pulled with [`next`](Self::next). Each call either returns a
/// buffered record or drives the traversal forward until one is available,
/// the stream is paused, or no fragment is left.
pub struct EventStream {
    url: String,
    collaborators: Collaborators,
    options: StreamOptions,
    extractor: MemberExtractor,
    limiter: RateLimiter,
    bookkeeper: FragmentBookkeeper,
    processed: DedupCache,
    buffer: VecDeque<Record>,
    state: StreamState,
    syncing: bool,
    control: StreamControl,
    events: broadcast::Sender<StreamEvent>,
    stats: StreamStats,
}

impl EventStream {
    /// Creates a stream for `url`
    ///
    /// # Arguments
    ///
    /// * `url` - Seed URL: the event stream, a collection or a first fragment
    /// * `collaborators` - Fetching, parsing, metadata and output capabilities
    /// * `options` - Runtime options
    /// * `checkpoint` - State to resume from; without one the seed is the only
    ///   fragment, eligible immediately
    ///
    /// # Returns
    ///
    /// * `Ok(EventStream)` - The stream, not yet started
    /// * `Err(TideError)` - The checkpoint could not be read
    pub fn new(
        url: &str,
        collaborators: Collaborators,
        options: StreamOptions,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let extractor = MemberExtractor {
            from_time: options.from_time,
            emit_member_once: options.emit_member_once,
            dereference: options.dereference_members,
        };

        let mut stream = Self {
            url: url.to_string(),
            collaborators,
            limiter: RateLimiter::per_minute(options.requests_per_minute),
            processed: DedupCache::new(options.processed_uris_count),
            extractor,
            options,
            bookkeeper: FragmentBookkeeper::new(),
            buffer: VecDeque::new(),
            state: StreamState::Idle,
            syncing: false,
            control: StreamControl::default(),
            events,
            stats: StreamStats::default(),
        };

        match checkpoint {
            Some(checkpoint) => stream.import_state(checkpoint)?,
            None => {
                stream.bookkeeper.add_fragment(url, Duration::ZERO);
            }
        }

        Ok(stream)
    }

    /// Returns the next delivery
    ///
    /// Paused streams keep their buffered records until resumed. After
    /// [`Delivery::Ended`] every further call returns `Ended` again.
    pub async fn next(&mut self) -> Delivery {
        loop {
            if self.control.is_destroyed() {
                self.state = StreamState::Ended;
                return Delivery::Ended;
            }

            if self.control.is_paused() {
                if !self.state.is_terminal() {
                    self.state = StreamState::Paused;
                }
                return Delivery::Paused;
            }

            if let Some(record) = self.buffer.pop_front() {
                return Delivery::Record(record);
            }

            if self.state.is_terminal() {
                return Delivery::Ended;
            }

            self.advance().await;
        }
    }

    /// Performs one state transition from idle
    async fn advance(&mut self) {
        if !self.bookkeeper.next_fragment_exists() {
            tracing::info!("No fragments left for {}, stream ended", self.url);
            self.state = StreamState::Ended;
            return;
        }

        if !self.options.disable_synchronization
            && !self.syncing
            && self.bookkeeper.in_syncing_mode()
        {
            self.syncing = true;
            self.state = StreamState::Synchronizing;
            tracing::info!("Caught up with the live edge of {}", self.url);
            self.emit(StreamEvent::Synchronizing);
            return;
        }

        self.fetch_next_fragment().await;
    }

    fn resting_state(&self) -> StreamState {
        if self.syncing {
            StreamState::Synchronizing
        } else {
            StreamState::Idle
        }
    }

    /// Waits for the next fragment to become eligible, then fetches it
    ///
    /// Pausing or destroying the stream interrupts the wait; the fragment
    /// then stays pending.
    async fn fetch_next_fragment(&mut self) {
        let Some(next) = self.bookkeeper.get_next_fragment_to_fetch() else {
            return;
        };
        self.state = StreamState::Fetching;

        let wait = next.wait_from(Utc::now());
        if !wait.is_zero() {
            tracing::debug!(
                "Waiting {:.1}s before refetching: {}",
                wait.as_secs_f64(),
                next.url
            );
            if !self.control.sleep(wait).await {
                tracing::debug!("Wait for {} interrupted", next.url);
                self.state = self.resting_state();
                return;
            }
        }

        self.bookkeeper.start_fetch(&next.url);
        self.control.set_buffering(true);
        let records = self.retrieve(&next.url).await;
        self.control.set_buffering(false);

        if self.control.is_destroyed() {
            tracing::debug!(
                "Discarding {} records from {} after destroy",
                records.len(),
                next.url
            );
            return;
        }

        self.stats.members_emitted += records.len() as u64;
        self.buffer.extend(records);
        self.state = self.resting_state();
        self.emit(StreamEvent::FragmentProcessed { url: next.url });
    }

    /// Fetches and processes one fragment
    ///
    /// Failures are logged and yield no records; the traversal continues.
    async fn retrieve(&mut self, url: &str) -> Vec<Record> {
        tracing::debug!("GET {}", url);
        let started = Instant::now();

        self.limiter.plan_request(url).await;

        match self.process_fragment(url, started).await {
            Ok(records) => {
                self.stats.fragments_processed += 1;
                records
            }
            Err(e) => {
                tracing::error!("Failed to retrieve {}: {}", url, e);
                self.stats.fragments_failed += 1;
                Vec::new()
            }
        }
    }

    async fn process_fragment(&mut self, url: &str, started: Instant) -> Result<Vec<Record>> {
        let page = self
            .collaborators
            .fetcher
            .fetch(url, &self.options.request_headers)
            .await?;
        tracing::debug!(
            "{} {} ({} ms)",
            page.status_code,
            page.url,
            started.elapsed().as_millis()
        );

        // The final URL can differ from the requested one after redirects
        self.processed.set(url);
        self.processed.set(&page.url);

        if self.options.polls() {
            let ttl = polling_ttl(&page, self.options.polling_interval, Utc::now());
            self.bookkeeper.add_fragment(&page.url, ttl);
        }

        let media_type = page
            .media_type()
            .or_else(|| self.options.input_mime_type.clone())
            .ok_or_else(|| TideError::MissingContentType {
                url: page.url.clone(),
            })?;

        let quads = self
            .collaborators
            .parser
            .parse(&page.body, &page.url, &media_type)
            .await?;

        let metadata = self
            .collaborators
            .metadata
            .extract(&quads, &page.url)
            .await
            .map_err(|e| TideError::Metadata {
                url: page.url.clone(),
                message: e.to_string(),
            })?;
        self.emit(StreamEvent::Metadata {
            url: page.url.clone(),
            metadata: metadata.clone(),
        });

        self.follow_relations(url, &metadata);

        let member_ids = metadata.member_uris();
        let candidates = self
            .extractor
            .select(&quads, &member_ids, &mut self.processed);

        Ok(self.realize_members(candidates).await)
    }

    /// Schedules the fragments a page links to
    ///
    /// A page without relations is taken to be a collection; its first view
    /// is scheduled instead.
    fn follow_relations(&mut self, page_url: &str, metadata: &FeedMetadata) {
        if metadata.relations.is_empty() {
            let without_www = page_url.replacen("://www.", "://", 1);
            let view = metadata
                .first_view(page_url)
                .or_else(|| metadata.first_view(&without_www));
            if let Some(view) = view {
                tracing::debug!("Following view {} of collection {}", view, page_url);
                self.bookkeeper.add_fragment(view, Duration::ZERO);
            }
        }

        for relation in &metadata.relations {
            if is_pruned(relation, self.options.from_time) {
                tracing::debug!("Pruned relation {} from {}", relation.id, page_url);
                continue;
            }
            for node in &relation.nodes {
                if self.options.disable_synchronization && self.processed.has(node) {
                    continue;
                }
                self.bookkeeper.add_fragment(node, Duration::ZERO);
            }
        }
    }

    /// Builds records for the selected members, in page order
    ///
    /// Remote members are dereferenced concurrently; every request still
    /// passes through the shared rate limiter.
    async fn realize_members(&mut self, candidates: Vec<MemberCandidate>) -> Vec<Record> {
        let fetcher = &*self.collaborators.fetcher;
        let parser = &*self.collaborators.parser;
        let limiter = &self.limiter;
        let headers = &self.options.request_headers;
        let events = &self.events;

        let resolved: Vec<Option<(String, Vec<Quad>)>> =
            join_all(candidates.into_iter().map(|candidate| async move {
                match candidate {
                    MemberCandidate::Local { id, quads } => Some((id, quads)),
                    MemberCandidate::Remote { id } => {
                        match dereference_member(&id, fetcher, parser, limiter, headers).await {
                            Ok(quads) => Some((id, quads)),
                            Err(e) => {
                                tracing::error!("Failed to dereference member {}: {}", id, e);
                                let _ = events.send(StreamEvent::MemberFailed {
                                    id,
                                    message: e.to_string(),
                                });
                                None
                            }
                        }
                    }
                }
            }))
            .await;

        let failed = resolved.iter().filter(|r| r.is_none()).count();
        self.stats.members_failed += failed as u64;

        let mut records = Vec::with_capacity(resolved.len());
        for (id, quads) in resolved.into_iter().flatten() {
            match self.format_member(&id, quads).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::error!("Failed to process member {}: {}", id, e);
                    self.stats.members_failed += 1;
                }
            }
        }
        records
    }

    /// Converts a member into the configured output representation
    async fn format_member(&self, id: &str, quads: Vec<Quad>) -> Result<Record> {
        let context = self.options.json_ld_context.as_ref();

        match self.options.representation {
            Some(OutputRepresentation::Quads) => Ok(Record::Quads {
                id: id.to_string(),
                quads,
            }),
            Some(OutputRepresentation::Object) if !self.options.disable_framing => {
                let object = self.collaborators.framer.frame(id, &quads, context).await?;
                Ok(Record::Object {
                    id: id.to_string(),
                    object,
                })
            }
            Some(OutputRepresentation::Object) => {
                let text = self.collaborators.serializer.serialize(&quads, JSON_LD).await?;
                let object: Value = serde_json::from_str(&text).map_err(|e| TideError::Framing {
                    id: id.to_string(),
                    message: e.to_string(),
                })?;
                Ok(Record::Object {
                    id: id.to_string(),
                    object,
                })
            }
            None => {
                let text = if self.options.mime_type != JSON_LD || self.options.disable_framing {
                    self.collaborators
                        .serializer
                        .serialize(&quads, &self.options.mime_type)
                        .await?
                } else {
                    let framed = self.collaborators.framer.frame(id, &quads, context).await?;
                    serde_json::to_string(&framed)?
                };
                Ok(Record::Serialized(format!("{}\n", text.trim_end_matches('\n'))))
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Stops issuing fetches; buffered records are kept
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Resumes a paused stream
    pub fn resume(&mut self) {
        self.control.resume();
        if self.state == StreamState::Paused {
            self.state = self.resting_state();
        }
    }

    /// Ends the stream, interrupting any pending wait
    ///
    /// A fetch already in flight completes, but its records are discarded.
    pub fn destroy(&mut self) {
        self.control.destroy();
        self.state = StreamState::Ended;
    }

    /// Handle for pausing or destroying the stream from another task
    pub fn control(&self) -> StreamControl {
        self.control.clone()
    }

    /// Subscribes to stream notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Marks fragments as permanently ignored
    pub fn ignore_pages<S: AsRef<str>>(&mut self, urls: &[S]) {
        for url in urls {
            self.bookkeeper.blacklist_fragment(url.as_ref());
        }
    }

    /// Returns true while a fragment fetch cycle is in flight
    pub fn is_buffering(&self) -> bool {
        self.control.is_buffering()
    }

    /// Current state as seen by the consumer
    pub fn state(&self) -> StreamState {
        if self.state.is_terminal() || self.control.is_destroyed() {
            StreamState::Ended
        } else if self.control.is_paused() {
            StreamState::Paused
        } else {
            self.state
        }
    }

    /// Exports the traversal state
    ///
    /// The stream is left untouched; buffered records are copied, not drained.
    ///
    /// # Returns
    ///
    /// * `Ok(Checkpoint)` - The state
    /// * `Err(TideError::ExportWhileRunning)` - The stream is neither paused nor ended
    pub fn export_state(&self) -> Result<Checkpoint> {
        let state = self.state();
        if !state.allows_export() {
            return Err(TideError::ExportWhileRunning { state });
        }

        Ok(Checkpoint {
            bookkeeper: self.bookkeeper.serialize()?,
            member_buffer: serde_json::to_string(&self.buffer)?,
            processed_uris: self.processed.to_json()?,
        })
    }

    /// Replaces the traversal state with a checkpoint
    ///
    /// Restored records are delivered before anything already buffered, in
    /// their original order.
    pub fn import_state(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        let bookkeeper = FragmentBookkeeper::deserialize(&checkpoint.bookkeeper)?;

        let records: Vec<Record> = if checkpoint.member_buffer.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Option<Vec<Record>>>(&checkpoint.member_buffer)
                .map_err(|e| TideError::InvalidCheckpoint(format!("member buffer: {}", e)))?
                .unwrap_or_default()
        };

        let processed =
            DedupCache::from_json(self.options.processed_uris_count, &checkpoint.processed_uris)?;

        tracing::info!(
            "Restored {} fragments, {} buffered records and {} processed URIs",
            bookkeeper.len(),
            records.len(),
            processed.len()
        );

        self.stats.records_restored += records.len() as u64;
        for record in records.into_iter().rev() {
            self.buffer.push_front(record);
        }
        self.bookkeeper = bookkeeper;
        self.processed = processed;
        self.syncing = false;
        if !self.control.is_destroyed() {
            self.state = StreamState::Idle;
        }
        Ok(())
    }

    /// The seed URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bookkeeper(&self) -> &FragmentBookkeeper {
        &self.bookkeeper
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Number of records waiting to be delivered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if `uri` is in the seen-set
    pub fn has_processed(&self, uri: &str) -> bool {
        self.processed.has(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Collection;
    use crate::stream::collaborators::{Headers, Page, PageFetcher};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Serves fixed N-Quads bodies and records every request
    #[derive(Default)]
    struct StaticFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn with(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str, _headers: &Headers) -> Result<Page> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(Page::ok(url, "application/n-quads", body)),
                None => Err(TideError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn quads_options() -> StreamOptions {
        StreamOptions {
            representation: Some(OutputRepresentation::Quads),
            disable_synchronization: true,
            ..StreamOptions::default()
        }
    }

    async fn drain(stream: &mut EventStream) -> Vec<Record> {
        let mut records = Vec::new();
        while let Delivery::Record(record) = stream.next().await {
            records.push(record);
        }
        records
    }

    const P1: &str = "https://ex.org/p1";
    const P2: &str = "https://ex.org/p2";

    fn page_one() -> String {
        format!(
            "<https://ex.org/c> <{member}> <https://ex.org/m1> .\n\
             <https://ex.org/m1> <https://ex.org/name> \"one\" .\n\
             <{p1}> <{rel}> _:r .\n\
             _:r <{node}> <{p2}> .\n",
            member = vocab::TREE_MEMBER,
            rel = vocab::TREE_RELATION,
            node = vocab::TREE_NODE,
            p1 = P1,
            p2 = P2,
        )
    }

    fn page_two() -> String {
        format!(
            "<https://ex.org/c> <{member}> <https://ex.org/m2> .\n\
             <https://ex.org/m2> <https://ex.org/name> \"two\" .\n",
            member = vocab::TREE_MEMBER,
        )
    }

    #[test]
    fn test_is_pruned() {
        let from = DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut relation = Relation {
            id: "_:r".into(),
            types: vec![vocab::TREE_LESS_THAN_RELATION.into()],
            nodes: vec!["x".into()],
            values: vec!["2021-12-31T00:00:00Z".into()],
        };
        assert!(is_pruned(&relation, Some(from)));
        assert!(!is_pruned(&relation, None));

        relation.values = vec!["2022-02-01T00:00:00Z".into()];
        assert!(!is_pruned(&relation, Some(from)));

        relation.values = vec!["not a date".into()];
        assert!(!is_pruned(&relation, Some(from)));
    }

    #[tokio::test]
    async fn test_follows_relations_and_ends() {
        let fetcher = StaticFetcher::with(&[(P1, &page_one()), (P2, &page_two())]);
        let collaborators = Collaborators::with_fetcher(fetcher.clone());
        let mut stream = EventStream::new(P1, collaborators, quads_options(), None).unwrap();

        let records = drain(&mut stream).await;
        let ids: Vec<_> = records.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec!["https://ex.org/m1", "https://ex.org/m2"]);
        assert_eq!(fetcher.requests(), vec![P1, P2]);
        assert_eq!(stream.state(), StreamState::Ended);
        assert_eq!(stream.stats().fragments_processed, 2);

        // Ended is sticky
        assert!(matches!(stream.next().await, Delivery::Ended));
    }

    #[tokio::test]
    async fn test_failed_fragment_does_not_stop_stream() {
        let fetcher = StaticFetcher::with(&[(P1, &page_one())]);
        let collaborators = Collaborators::with_fetcher(fetcher.clone());
        let mut stream = EventStream::new(P1, collaborators, quads_options(), None).unwrap();

        let records = drain(&mut stream).await;
        assert_eq!(records.len(), 1);
        assert_eq!(stream.stats().fragments_failed, 1);
        assert_eq!(stream.state(), StreamState::Ended);
    }

    #[tokio::test]
    async fn test_ignored_pages_are_not_fetched() {
        let fetcher = StaticFetcher::with(&[(P1, &page_one()), (P2, &page_two())]);
        let collaborators = Collaborators::with_fetcher(fetcher.clone());
        let mut stream = EventStream::new(P1, collaborators, quads_options(), None).unwrap();
        stream.ignore_pages(&[P2]);

        let records = drain(&mut stream).await;
        assert_eq!(records.len(), 1);
        assert_eq!(fetcher.requests(), vec![P1]);
    }

    #[tokio::test]
    async fn test_export_requires_pause_or_end() {
        let fetcher = StaticFetcher::with(&[(P1, &page_one()), (P2, &page_two())]);
        let collaborators = Collaborators::with_fetcher(fetcher);
        let mut stream = EventStream::new(P1, collaborators, quads_options(), None).unwrap();

        assert!(matches!(
            stream.export_state(),
            Err(TideError::ExportWhileRunning {
                state: StreamState::Idle
            })
        ));

        stream.pause();
        assert!(matches!(stream.next().await, Delivery::Paused));
        assert!(stream.export_state().is_ok());

        stream.resume();
        drain(&mut stream).await;
        assert!(stream.export_state().is_ok());
    }

    #[tokio::test]
    async fn test_synchronizing_notification_fires_once() {
        let fetcher = StaticFetcher::with(&[(P1, &page_two())]);
        let collaborators = Collaborators::with_fetcher(fetcher);
        let options = StreamOptions {
            representation: Some(OutputRepresentation::Quads),
            polling_interval: Duration::from_secs(3600),
            ..StreamOptions::default()
        };
        let mut stream = EventStream::new(P1, collaborators, options, None).unwrap();
        let mut events = stream.subscribe();

        assert!(matches!(stream.next().await, Delivery::Record(_)));
        // The only fragment is now scheduled an hour out
        assert!(stream.bookkeeper().in_syncing_mode());

        let control = stream.control();
        let reader = tokio::spawn(async move {
            let delivery = stream.next().await;
            (stream, delivery)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        control.destroy();
        let (stream, delivery) = reader.await.unwrap();
        assert!(matches!(delivery, Delivery::Ended));
        assert_eq!(stream.stats().fragments_processed, 1);

        let mut synchronizing = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, StreamEvent::Synchronizing) {
                synchronizing += 1;
            }
        }
        assert_eq!(synchronizing, 1);
    }

    #[tokio::test]
    async fn test_collection_without_relations_pivots_to_view() {
        let metadata = FeedMetadata {
            relations: vec![],
            collections: vec![Collection {
                id: "https://ex.org/c".into(),
                members: vec![],
                views: vec![P2.into()],
            }],
        };
        let fetcher = StaticFetcher::with(&[]);
        let collaborators = Collaborators::with_fetcher(fetcher);
        let mut stream =
            EventStream::new("https://www.ex.org/c", collaborators, quads_options(), None).unwrap();

        stream.follow_relations("https://www.ex.org/c", &metadata);
        assert!(stream.bookkeeper().fragment(P2).is_some_and(|f| f.is_pending()));
    }
}
