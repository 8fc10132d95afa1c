//! Page segmentation over a shard stream
//!
//! Shards `1, 2, ...` are read lazily and in order; page boundaries are only
//! known from PAGE markers, so a page is emitted once the next page's marker
//! arrives, or at end of stream if it is the declared last page.

use crate::config::ShardReadPolicy;
use crate::error::SegmentError;
use margin_domain::location::shard_key;
use margin_domain::traits::ObjectStore;
use margin_domain::{ExtractionElement, ExtractionShard, PageGroup};
use std::collections::VecDeque;
use std::fmt::Display;
use tracing::{debug, warn};

#[derive(Debug)]
struct Accumulator {
    page: u32,
    marker: Option<ExtractionElement>,
    elements: Vec<ExtractionElement>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            page: 1,
            marker: None,
            elements: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.marker.is_none() && self.elements.is_empty()
    }

    fn take(&mut self) -> PageGroup {
        let acc = std::mem::replace(self, Accumulator::new());
        PageGroup::new(acc.page, acc.marker, acc.elements)
    }
}

/// Streams complete [`PageGroup`]s out of an extraction result's shards
///
/// Yields `Err` at most once, after which iteration ends; the page being
/// accumulated at that point is never emitted.
pub struct PageSegmenter<'a, S> {
    store: &'a S,
    bucket: String,
    prefix: String,
    policy: ShardReadPolicy,
    next_shard: u32,
    envelope: Option<ExtractionShard>,
    pending: VecDeque<ExtractionElement>,
    current: Accumulator,
    done: bool,
}

impl<'a, S> PageSegmenter<'a, S>
where
    S: ObjectStore,
    S::Error: Display,
{
    /// Segment the shards stored at `{prefix}/1`, `{prefix}/2`, ... in `bucket`
    pub fn new(
        store: &'a S,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        policy: ShardReadPolicy,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            policy,
            next_shard: 1,
            envelope: None,
            pending: VecDeque::new(),
            current: Accumulator::new(),
            done: false,
        }
    }

    /// Envelope of the first shard (blocks removed), once it has been read
    pub fn envelope(&self) -> Option<&ExtractionShard> {
        self.envelope.as_ref()
    }

    /// Declared total page count, once the first shard has been read
    pub fn total_pages(&self) -> Option<u32> {
        self.envelope.as_ref().and_then(|e| e.total_pages())
    }

    /// Shards read so far
    pub fn shards_read(&self) -> u32 {
        self.next_shard - 1
    }

    fn read_shard(&self, index: u32) -> Result<Option<ExtractionShard>, SegmentError> {
        let key = shard_key(&self.prefix, index);
        let bytes = self
            .store
            .get(&self.bucket, &key)
            .map_err(|e| SegmentError::Read {
                index,
                reason: e.to_string(),
            })?;
        match bytes {
            Some(bytes) => ExtractionShard::parse(&bytes)
                .map(Some)
                .map_err(|e| SegmentError::MalformedShard {
                    index,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Load the next shard into `pending`; `Ok(false)` at end of stream
    fn load_next(&mut self) -> Result<bool, SegmentError> {
        let index = self.next_shard;
        match self.read_shard(index) {
            Ok(Some(mut shard)) => {
                debug!(shard = index, blocks = shard.blocks.len(), "shard read");
                self.pending.extend(shard.blocks.drain(..));
                if self.envelope.is_none() {
                    self.envelope = Some(shard);
                }
                self.next_shard += 1;
                Ok(true)
            }
            Ok(None) => {
                debug!(shard = index, "no further shards");
                Ok(false)
            }
            Err(e) => match self.policy {
                ShardReadPolicy::Strict => Err(e),
                ShardReadPolicy::Lenient => {
                    warn!(error = %e, "treating shard failure as end of stream");
                    Ok(false)
                }
            },
        }
    }

    /// Route one element; returns a page that just became complete
    fn push(&mut self, element: ExtractionElement) -> Option<PageGroup> {
        if !element.is_page_marker() {
            self.current.elements.push(element);
            return None;
        }

        // Markers without a page number come from single-page results
        let page = element.page.unwrap_or(1);
        let adopt = self.current.is_empty()
            || (self.current.marker.is_none() && self.current.page == page);
        if adopt {
            self.current.page = page;
            self.current.marker = Some(element);
            return None;
        }

        let complete = self.current.take();
        self.current.page = page;
        self.current.marker = Some(element);
        Some(complete)
    }

    fn finish(&mut self) -> Option<PageGroup> {
        if self.current.is_empty() {
            return None;
        }
        let total = self.total_pages();
        if total == Some(self.current.page) {
            Some(self.current.take())
        } else {
            warn!(
                page = self.current.page,
                total_pages = ?total,
                "dropping trailing page: stream ended before the declared last page"
            );
            None
        }
    }
}

impl<'a, S> Iterator for PageSegmenter<'a, S>
where
    S: ObjectStore,
    S::Error: Display,
{
    type Item = Result<PageGroup, SegmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(element) = self.pending.pop_front() {
                if let Some(group) = self.push(element) {
                    debug!(page = group.page_number, elements = group.len(), "page complete");
                    return Some(Ok(group));
                }
                continue;
            }

            match self.load_next() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return self.finish().map(Ok);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use margin_domain::ElementKind;
    use margin_store::{FailOn, MemoryObjectStore};
    use serde_json::json;

    const BUCKET: &str = "out";
    const PREFIX: &str = "jobs/job-1";

    fn shard(blocks: serde_json::Value, pages: u32) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "AnalyzeDocumentModelVersion": "1.0",
            "DocumentMetadata": {"Pages": pages},
            "JobStatus": "SUCCEEDED",
            "Blocks": blocks,
        }))
        .unwrap()
    }

    fn marker(page: u32) -> serde_json::Value {
        json!({"BlockType": "PAGE", "Page": page})
    }

    fn word(page: u32, confidence: f64) -> serde_json::Value {
        json!({"BlockType": "WORD", "Page": page, "Confidence": confidence})
    }

    fn collect(store: &MemoryObjectStore, policy: ShardReadPolicy) -> Vec<Result<PageGroup, SegmentError>> {
        PageSegmenter::new(store, BUCKET, PREFIX, policy).collect()
    }

    #[test]
    fn test_pages_split_across_shards() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "jobs/job-1/1", shard(json!([marker(1), word(1, 40.0), marker(2)]), 2));
        store.insert(BUCKET, "jobs/job-1/2", shard(json!([word(2, 99.0)]), 2));

        let pages: Vec<PageGroup> = collect(&store, ShardReadPolicy::Strict)
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].elements.len(), 1);
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[1].elements[0].confidence, Some(99.0));
        assert!(pages.iter().all(|p| p.marker.is_some()));
    }

    #[test]
    fn test_truncated_stream_drops_trailing_page() {
        let store = MemoryObjectStore::new();
        // Declares 3 pages but shard 2 was never written
        store.insert(BUCKET, "jobs/job-1/1", shard(json!([marker(1), word(1, 90.0), marker(2), word(2, 90.0)]), 3));

        let pages = collect(&store, ShardReadPolicy::Strict);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].as_ref().unwrap().page_number, 1);
    }

    #[test]
    fn test_strict_read_failure_surfaces_once() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "jobs/job-1/1", shard(json!([marker(1), word(1, 90.0), marker(2)]), 2));
        store.insert(BUCKET, "jobs/job-1/2", shard(json!([word(2, 90.0)]), 2));
        store.fail_on(FailOn::Get, BUCKET, "jobs/job-1/2");

        let items = collect(&store, ShardReadPolicy::Strict);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().page_number, 1);
        assert!(matches!(items[1], Err(SegmentError::Read { index: 2, .. })));
    }

    #[test]
    fn test_lenient_read_failure_ends_stream() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "jobs/job-1/1", shard(json!([marker(1), word(1, 90.0), marker(2)]), 2));
        store.insert(BUCKET, "jobs/job-1/2", b"{not json".to_vec());

        let items = collect(&store, ShardReadPolicy::Lenient);
        // Page 2 is the declared last page, but its content never arrived:
        // the marker alone is emitted as the final group
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Result::is_ok));
        assert!(items[1].as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_strict_malformed_shard() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "jobs/job-1/1", b"{not json".to_vec());

        let items = collect(&store, ShardReadPolicy::Strict);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(SegmentError::MalformedShard { index: 1, .. })));
    }

    #[test]
    fn test_marker_without_page_defaults_to_one() {
        let store = MemoryObjectStore::new();
        store.insert(
            BUCKET,
            "jobs/job-1/1",
            shard(json!([{"BlockType": "PAGE"}, {"BlockType": "LINE"}, {"BlockType": "WORD", "Confidence": 70.0}]), 1),
        );

        let pages = collect(&store, ShardReadPolicy::Strict);
        assert_eq!(pages.len(), 1);
        let page = pages[0].as_ref().unwrap();
        assert_eq!(page.page_number, 1);
        assert_eq!(page.elements.len(), 2);
    }

    #[test]
    fn test_leading_elements_join_first_page() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "jobs/job-1/1", shard(json!([word(1, 90.0), marker(1), word(1, 80.0)]), 1));

        let pages = collect(&store, ShardReadPolicy::Strict);
        assert_eq!(pages.len(), 1);
        let page = pages[0].as_ref().unwrap();
        assert_eq!(page.elements.len(), 2);
        assert_eq!(page.marker.as_ref().map(|m| m.kind.clone()), Some(ElementKind::Page));
    }

    #[test]
    fn test_no_shards_yields_nothing() {
        let store = MemoryObjectStore::new();
        let mut segmenter = PageSegmenter::new(&store, BUCKET, PREFIX, ShardReadPolicy::Strict);
        assert!(segmenter.next().is_none());
        assert!(segmenter.next().is_none());
        assert_eq!(segmenter.shards_read(), 0);
        assert!(segmenter.envelope().is_none());
    }

    #[test]
    fn test_envelope_comes_from_first_shard() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "jobs/job-1/1", shard(json!([marker(1)]), 1));

        let mut segmenter = PageSegmenter::new(&store, BUCKET, PREFIX, ShardReadPolicy::Strict);
        let page = segmenter.next().unwrap().unwrap();
        assert!(page.is_empty());
        let envelope = segmenter.envelope().unwrap();
        assert!(envelope.blocks.is_empty());
        assert_eq!(segmenter.total_pages(), Some(1));
    }
}
