/*!
 * Header/Content region classification
 */

use regex::bytes::Regex;
use serde::Serialize;
use std::fmt;

use super::source::Row;
use crate::config::MatchMode;
use crate::error::Result;

/// Region a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Header,
    Content,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Header => write!(f, "header"),
            Region::Content => write!(f, "content"),
        }
    }
}

/// A row tagged with the region it was read in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub region: Region,
    pub payload: Row,
}

/// Sentinel matcher, literal sentinels are escaped into the same regex engine
#[derive(Debug, Clone)]
pub struct SentinelMatcher {
    pattern: Regex,
}

impl SentinelMatcher {
    pub fn new(sentinel: &str, mode: MatchMode) -> Result<Self> {
        let pattern = match mode {
            MatchMode::Literal => Regex::new(&regex::escape(sentinel))?,
            MatchMode::Regex => Regex::new(sentinel)?,
        };
        Ok(Self { pattern })
    }

    pub fn literal(sentinel: &str) -> Result<Self> {
        Self::new(sentinel, MatchMode::Literal)
    }

    /// Matched against the row content, terminator excluded
    pub fn is_match(&self, row: &Row) -> bool {
        self.pattern.is_match(row.content())
    }
}

/// Two-state machine: Header until the first sentinel row, Content after.
///
/// A row is tagged with the region in effect when it arrives, so the
/// sentinel row itself is a header row.
#[derive(Debug)]
pub struct RegionClassifier {
    matcher: SentinelMatcher,
    region: Region,
    rows_seen: u64,
    sentinel_row: Option<u64>,
}

impl RegionClassifier {
    pub fn new(matcher: SentinelMatcher) -> Self {
        Self {
            matcher,
            region: Region::Header,
            rows_seen: 0,
            sentinel_row: None,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// 1-based index of the row that ended the header, if any
    pub fn sentinel_row(&self) -> Option<u64> {
        self.sentinel_row
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn classify(&mut self, row: Row) -> ClassifiedRow {
        self.rows_seen += 1;
        let region = self.region;

        if region == Region::Header && self.matcher.is_match(&row) {
            self.region = Region::Content;
            self.sentinel_row = Some(self.rows_seen);
        }

        ClassifiedRow {
            region,
            payload: row,
        }
    }
}
