// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Physical path → reference coordinate index.
//!
//! Several pages can resolve to the same physical document (for example
//! `/a/page` and `/a/page.html`). The index lets one remote lookup per
//! physical path fan its result out to every place in the project that
//! refers to it.
//!
//! ```text
//! /a/page.docx        → [urls|https://x/a/page|doc, urls|https://x/a/page.html|doc]
//! /a/child/page.docx  → [urls|https://x/a/page|childDoc, urls|https://x/a/page.html|childDoc]
//! ```
//!
//! Coordinates are typed [`ReferencePath`]s. Resolving one that does not
//! point at a [`DocLocation`] is a [`SyncError::DataModelMismatch`]: it means
//! the index and the project disagree and is never papered over.

use crate::error::{Result, SyncError};
use crate::project::{DocLocation, DocumentReference, ProjectDetail};
use indexmap::IndexMap;
use std::fmt;

/// Named object field along a reference path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Urls,
    Doc,
    ChildDoc,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urls => "urls",
            Self::Doc => "doc",
            Self::ChildDoc => "childDoc",
        }
    }
}

/// One step of a reference path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object field access.
    Field(Field),
    /// Map lookup by key.
    Key(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(field) => f.write_str(field.as_str()),
            Self::Key(key) => f.write_str(key),
        }
    }
}

/// A typed coordinate into a [`ProjectDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencePath(Vec<Segment>);

impl ReferencePath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// `urls|<url>|doc`
    pub fn doc(url: &str) -> Self {
        Self(vec![
            Segment::Field(Field::Urls),
            Segment::Key(url.to_string()),
            Segment::Field(Field::Doc),
        ])
    }

    /// `urls|<url>|childDoc`
    pub fn child_doc(url: &str) -> Self {
        Self(vec![
            Segment::Field(Field::Urls),
            Segment::Key(url.to_string()),
            Segment::Field(Field::ChildDoc),
        ])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Walk the project graph to the location this path names.
    pub fn resolve_mut<'a>(&self, project: &'a mut ProjectDetail) -> Result<&'a mut DocLocation> {
        let mut node = NodeMut::Project(project);
        for segment in &self.0 {
            node = match (node, segment) {
                (NodeMut::Project(p), Segment::Field(Field::Urls)) => NodeMut::Urls(p),
                (NodeMut::Urls(p), Segment::Key(key)) => match p.urls.get_mut(key) {
                    Some(reference) => NodeMut::Reference(reference),
                    None => return Err(self.mismatch(segment)),
                },
                (NodeMut::Reference(r), Segment::Field(Field::Doc)) => NodeMut::Location(&mut r.doc),
                (NodeMut::Reference(r), Segment::Field(Field::ChildDoc)) => {
                    NodeMut::Location(&mut r.child_doc)
                }
                _ => return Err(self.mismatch(segment)),
            };
        }
        match node {
            NodeMut::Location(location) => Ok(location),
            _ => Err(SyncError::DataModelMismatch {
                path: self.to_string(),
                segment: "<end>".to_string(),
            }),
        }
    }

    /// Read-only variant of [`resolve_mut`](Self::resolve_mut).
    pub fn resolve<'a>(&self, project: &'a ProjectDetail) -> Result<&'a DocLocation> {
        match self.0.as_slice() {
            [Segment::Field(Field::Urls), Segment::Key(key), Segment::Field(field)] => {
                let reference = project.urls.get(key).ok_or_else(|| self.mismatch(&self.0[1]))?;
                match field {
                    Field::Doc => Ok(&reference.doc),
                    Field::ChildDoc => Ok(&reference.child_doc),
                    Field::Urls => Err(self.mismatch(&self.0[2])),
                }
            }
            _ => Err(SyncError::DataModelMismatch {
                path: self.to_string(),
                segment: self.0.first().map(|s| s.to_string()).unwrap_or_default(),
            }),
        }
    }

    fn mismatch(&self, segment: &Segment) -> SyncError {
        SyncError::DataModelMismatch {
            path: self.to_string(),
            segment: segment.to_string(),
        }
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Cursor for walking the project graph mutably.
enum NodeMut<'a> {
    Project(&'a mut ProjectDetail),
    Urls(&'a mut ProjectDetail),
    Reference(&'a mut DocumentReference),
    Location(&'a mut DocLocation),
}

/// Map from physical path to every coordinate that refers to it.
///
/// Keys keep first-insertion order; that order is the lookup order.
#[derive(Debug, Clone, Default)]
pub struct PathReferenceIndex {
    entries: IndexMap<String, Vec<ReferencePath>>,
}

impl PathReferenceIndex {
    /// Index the doc and child-doc location of every reference, in order.
    pub fn build(project: &ProjectDetail) -> Self {
        let mut index = Self::default();
        for reference in project.urls.values() {
            index.register(&reference.doc.file_path, ReferencePath::doc(&reference.url));
            index.register(&reference.child_doc.file_path, ReferencePath::child_doc(&reference.url));
        }
        index
    }

    /// Append a coordinate under `path`. Identical coordinates are kept.
    pub fn register(&mut self, path: &str, coordinate: ReferencePath) {
        match self.entries.get_mut(path) {
            Some(list) => list.push(coordinate),
            None => {
                self.entries.insert(path.to_string(), vec![coordinate]);
            }
        }
    }

    /// Physical paths in first-insertion order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &String> + '_ {
        self.entries.keys()
    }


    pub fn get(&self, path: &str) -> Option<&[ReferencePath]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of coordinates across all paths.
    pub fn coordinate_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
