// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

//! Inspection of the course listing page.
//!
//! The page is scanned tag by tag, without building a DOM: only the
//! identifiers of the attendance cards and the badge inside each card matter.

use crate::task::TaskId;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Class of the badge shown on a signed card.
pub const SIGNED_CLASS: &str = "layui-bg-green";
/// Label of the badge shown on a signed card.
pub const SIGNED_LABEL: &str = "已签";

static CARD_ID: OnceLock<Regex> = OnceLock::new();
static GPS_CALL_ID: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
enum ScanError {
    #[error("unterminated tag at byte {0}")]
    UnterminatedTag(usize),
    #[error("element {0} is never closed")]
    UnclosedBlock(String),
}

/// Collect the identifiers of all the cards in the page.
///
/// Both the card element ids (`punchcard_<id>`) and the legacy coordinate
/// check calls (`punch_gps(<id>)`) are taken, and the union is returned.
/// Whether the legacy calls always denote the same kind of task as the cards
/// has not been verified.
pub fn extract_task_ids(markup: &str) -> BTreeSet<TaskId> {
    let card = CARD_ID.get_or_init(|| Regex::new(r"punchcard_(\d+)").expect("invalid regex"));
    let gps =
        GPS_CALL_ID.get_or_init(|| Regex::new(r"punch_gps\((\d+)\)").expect("invalid regex"));

    card.captures_iter(markup)
        .chain(gps.captures_iter(markup))
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| match m.as_str().parse::<TaskId>() {
            Ok(id) => Some(id),
            Err(err) => {
                log::debug!("ignoring task identifier {}: {}", m.as_str(), err);
                None
            }
        })
        .collect()
}

/// Return true if the card `id` carries the signed badge.
///
/// The badge is a `<span>` with the `layui-bg-green` class whose only content
/// is the `已签` label; whitespace around the label is accepted.
///
/// Fails open: a card that is missing, or markup that cannot be scanned,
/// yields false so that a check-in is attempted rather than skipped.
pub fn is_signed(markup: &str, id: &TaskId) -> bool {
    let res = card_block(markup, id).and_then(|block| match block {
        Some(block) => has_signed_badge(block),
        None => Ok(false),
    });
    match res {
        Ok(signed) => signed,
        Err(err) => {
            log::warn!("cannot parse the status of task {}: {}", id, err);
            false
        }
    }
}

/// Content of the `<div id="punchcard_<id>">` element, if any.
fn card_block<'a>(markup: &'a str, id: &TaskId) -> Result<Option<&'a str>, ScanError> {
    let wanted = format!("punchcard_{}", id);
    let mut tags = Tags::new(markup);
    while let Some(tag) = tags.next() {
        let tag = tag?;
        if tag.closing || tag.name != "div" || attr(tag.attrs, "id") != Some(wanted.as_str()) {
            continue;
        }
        let mut depth = 1_usize;
        for inner in tags.by_ref() {
            let inner = inner?;
            if inner.name != "div" || inner.self_closing {
                continue;
            }
            if inner.closing {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(&markup[tag.end..inner.start]));
                }
            } else {
                depth += 1;
            }
        }
        return Err(ScanError::UnclosedBlock(wanted));
    }
    Ok(None)
}

/// True if `block` contains `<span class="... layui-bg-green ...">已签</span>`.
fn has_signed_badge(block: &str) -> Result<bool, ScanError> {
    let mut tags = Tags::new(block);
    while let Some(tag) = tags.next() {
        let tag = tag?;
        if tag.closing || tag.name != "span" {
            continue;
        }
        let green = attr(tag.attrs, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == SIGNED_CLASS));
        if !green {
            continue;
        }
        // the label must be the only content of the span
        if let Some(next) = tags.clone().next() {
            let next = next?;
            if next.closing
                && next.name == "span"
                && block[tag.end..next.start].trim() == SIGNED_LABEL
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[derive(Debug)]
struct Tag<'a> {
    /// Lower-case element name.
    name: String,
    /// Raw text between the name and the closing `>`.
    attrs: &'a str,
    closing: bool,
    self_closing: bool,
    /// Offset of `<`.
    start: usize,
    /// Offset past `>`.
    end: usize,
}

/// Iterator over the tags of a document, skipping comments, declarations and
/// the content of `<script>`/`<style>` elements.
#[derive(Clone)]
struct Tags<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Tags<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    fn next_tag(&self) -> Result<Option<Tag<'a>>, ScanError> {
        let s = self.s;
        let mut pos = self.pos;
        loop {
            let start = match s.get(pos..).and_then(|x| x.find('<')) {
                Some(rel) => pos + rel,
                None => return Ok(None),
            };
            let rest = &s[start + 1..];
            if rest.starts_with("!--") {
                let close = rest.find("-->").ok_or(ScanError::UnterminatedTag(start))?;
                pos = start + 1 + close + 3;
                continue;
            }
            if rest.starts_with('!') || rest.starts_with('?') {
                let close = rest.find('>').ok_or(ScanError::UnterminatedTag(start))?;
                pos = start + 1 + close + 1;
                continue;
            }

            let closing = rest.starts_with('/');
            let name_start = if closing { start + 2 } else { start + 1 };
            if !s
                .as_bytes()
                .get(name_start)
                .is_some_and(|b| b.is_ascii_alphabetic())
            {
                // a stray '<' in text
                pos = start + 1;
                continue;
            }
            let name_end = name_start
                + s[name_start..]
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
                    .count();
            let end = tag_end(s, name_end).ok_or(ScanError::UnterminatedTag(start))?;
            let attrs = &s[name_end..end - 1];
            return Ok(Some(Tag {
                name: s[name_start..name_end].to_ascii_lowercase(),
                attrs,
                closing,
                self_closing: attrs.trim_end().ends_with('/'),
                start,
                end,
            }));
        }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Result<Tag<'a>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let res = self.next_tag();
        match &res {
            Ok(Some(tag)) if !tag.closing && (tag.name == "script" || tag.name == "style") => {
                let close = format!("</{}", tag.name);
                match self.s[tag.end..].to_ascii_lowercase().find(&close) {
                    Some(rel) => self.pos = tag.end + rel,
                    None => {
                        self.pos = self.s.len();
                        return Some(Err(ScanError::UnterminatedTag(tag.start)));
                    }
                }
            }
            Ok(Some(tag)) => self.pos = tag.end,
            Ok(None) | Err(_) => self.pos = self.s.len(),
        }
        res.transpose()
    }
}

/// Offset past the `>` closing the tag, ignoring any `>` in quoted values.
fn tag_end(s: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, b) in s.as_bytes()[from..].iter().enumerate() {
        match (quote, *b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (None, b'>') => return Some(from + i + 1),
            _ => {}
        }
    }
    None
}

/// Value of the attribute `wanted`, matched case-insensitively; empty for
/// attributes without a value.
fn attr<'a>(attrs: &'a str, wanted: &str) -> Option<&'a str> {
    let b = attrs.as_bytes();
    let mut i = 0;
    while i < b.len() {
        while i < b.len() && (b[i].is_ascii_whitespace() || b[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < b.len() && !b[i].is_ascii_whitespace() && b[i] != b'=' && b[i] != b'/' {
            i += 1;
        }
        let name = &attrs[name_start..i];
        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = "";
        if i < b.len() && b[i] == b'=' {
            i += 1;
            while i < b.len() && b[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < b.len() && (b[i] == b'"' || b[i] == b'\'') {
                let q = b[i];
                i += 1;
                let value_start = i;
                while i < b.len() && b[i] != q {
                    i += 1;
                }
                value = &attrs[value_start..i];
                i = std::cmp::min(i + 1, b.len());
            } else {
                let value_start = i;
                while i < b.len() && !b[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = &attrs[value_start..i];
            }
        }
        if !name.is_empty() && name.eq_ignore_ascii_case(wanted) {
            return Some(value);
        }
    }
    None
}
