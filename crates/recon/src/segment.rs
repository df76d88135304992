//! Splits a paginated listing export into one text block per listing.
//!
//! Each listing in the export is stamped "Page k de N" on every page. A
//! section opens on the first page that says "Page 1 de N" and closes on
//! the page that says "Page N de N". Pages before the first opening marker
//! (cover, index) are skipped.

use std::ops::Range;

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::error::ReconError;

/// Recognises "page k of N" stamps. The pattern carries two capture
/// groups: the current page, then the page count.
#[derive(Debug, Clone)]
pub struct PageMarkers {
    pattern: Regex,
}

impl PageMarkers {
    pub fn new(pattern: &str) -> Result<Self, ReconError> {
        let pattern = Regex::new(pattern).map_err(|e| ReconError::InvalidPattern {
            name: "listing.page_marker".into(),
            message: e.to_string(),
        })?;
        if pattern.captures_len() < 3 {
            return Err(ReconError::InvalidPattern {
                name: "listing.page_marker".into(),
                message: "expected two capture groups (page, page count)".into(),
            });
        }
        Ok(Self { pattern })
    }

    /// Every (page, count) stamp on the page, in order.
    pub fn stamps<'t>(&'t self, text: &'t str) -> impl Iterator<Item = (u32, u32)> + 't {
        self.pattern.captures_iter(text).filter_map(|caps| {
            let page = caps.get(1)?.as_str().parse().ok()?;
            let count = caps.get(2)?.as_str().parse().ok()?;
            Some((page, count))
        })
    }

    pub fn is_first_page(&self, text: &str) -> bool {
        self.stamps(text).any(|(page, _)| page == 1)
    }

    pub fn is_last_page(&self, text: &str) -> bool {
        self.stamps(text).any(|(page, count)| page == count)
    }
}

/// One listing's pages, joined with newlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Position among the sections of its document.
    pub index: usize,
    /// Page indices covered, within the source document.
    pub pages: Range<usize>,
    pub text: String,
    /// False when the section was flushed without seeing its last page.
    pub closed: bool,
}

impl Section {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

/// Split one document's pages into listing sections.
///
/// Pages without text are ignored. A new "page 1" stamp while a section is still
/// open closes the open one first, so a listing with a damaged last-page
/// stamp never swallows the next listing. Whatever is still open at the
/// end is flushed as a final, unclosed section.
pub fn split_sections<S: AsRef<str>>(pages: &[S], markers: &PageMarkers) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut buffer: Vec<(usize, &str)> = Vec::new();
    let mut started = false;

    for (page_idx, page) in pages.iter().enumerate() {
        let text = page.as_ref();
        if text.trim().is_empty() {
            continue;
        }

        let first = markers.is_first_page(text);
        if !started {
            if !first {
                debug!("skipping page {} before the first listing", page_idx + 1);
                continue;
            }
            started = true;
        } else if first && !buffer.is_empty() {
            debug!("page {} opens a new listing before the previous one closed", page_idx + 1);
            flush(&mut sections, &mut buffer, false);
        }

        buffer.push((page_idx, text));
        if markers.is_last_page(text) {
            flush(&mut sections, &mut buffer, true);
        }
    }

    if !buffer.is_empty() {
        debug!("flushing unterminated listing at end of document");
        flush(&mut sections, &mut buffer, false);
    }

    sections
}

fn flush(sections: &mut Vec<Section>, buffer: &mut Vec<(usize, &str)>, closed: bool) {
    let (Some(&(first, _)), Some(&(last, _))) = (buffer.first(), buffer.last()) else {
        return;
    };
    let text = buffer.iter().map(|(_, t)| *t).collect::<Vec<_>>().join("\n");
    sections.push(Section {
        index: sections.len(),
        pages: first..last + 1,
        text,
        closed,
    });
    buffer.clear();
}
