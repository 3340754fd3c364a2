//! In-memory collaborator doubles shared by the integration tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use sumi_tide::rdf::vocab;
use sumi_tide::stream::{Delivery, EventStream, Headers, Page, PageFetcher, Record};
use sumi_tide::{Result, TideError};
use tokio::time::Instant;

pub const NQUADS: &str = "application/n-quads";

/// Serves canned pages and records every request with its (tokio) time
#[derive(Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, Page>,
    requests: Mutex<Vec<(String, Instant)>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an N-Quads page
    pub fn page(mut self, url: &str, body: String) -> Self {
        self.pages
            .insert(url.to_string(), Page::ok(url, NQUADS, &body));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl PageFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str, _headers: &Headers) -> Result<Page> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        self.pages.get(url).cloned().ok_or_else(|| TideError::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Builds N-Quads text for a fragment
pub struct FragmentBuilder {
    url: String,
    collection: String,
    lines: Vec<String>,
    relations: usize,
}

impl FragmentBuilder {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            collection: "https://ex.org/collection".to_string(),
            lines: Vec::new(),
            relations: 0,
        }
    }

    /// Declares a member with a name and, optionally, a generation time
    pub fn member(mut self, id: &str, generated_at: Option<&str>) -> Self {
        self.lines.push(format!(
            "<{}> <{}> <{}> .",
            self.collection,
            vocab::TREE_MEMBER,
            id
        ));
        self.lines
            .push(format!("<{}> <https://ex.org/ns#name> \"{}\" .", id, id));
        if let Some(time) = generated_at {
            self.lines.push(format!(
                "<{}> <{}> \"{}\"^^<http://www.w3.org/2001/XMLSchema#dateTime> .",
                id,
                vocab::PROV_GENERATED_AT_TIME,
                time
            ));
        }
        self
    }

    /// Links this fragment to `target`
    pub fn relation(mut self, target: &str) -> Self {
        let node = format!("_:rel{}", self.relations);
        self.relations += 1;
        self.lines.push(format!(
            "<{}> <{}> {} .",
            self.url,
            vocab::TREE_RELATION,
            node
        ));
        self.lines
            .push(format!("{} <{}> <{}> .", node, vocab::TREE_NODE, target));
        self
    }

    /// Declares a view of the collection
    pub fn view(mut self, collection: &str, target: &str) -> Self {
        self.lines.push(format!(
            "<{}> <{}> <{}> .",
            collection,
            vocab::TREE_VIEW,
            target
        ));
        self
    }

    pub fn build(self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }
}

/// Pulls records until the stream pauses or ends
pub async fn drain(stream: &mut EventStream) -> Vec<Record> {
    let mut records = Vec::new();
    while let Delivery::Record(record) = stream.next().await {
        records.push(record);
    }
    records
}

pub fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.id().map(str::to_string))
        .collect()
}
