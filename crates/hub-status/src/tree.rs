//! Revisioned tree storage and the wildcard query engine
//!
//! Everything here is a plain in-memory traversal; locking and watch
//! notification live in [`crate::Status`].

use hub_core::{Entry, Matches, Revision, StatusError, StatusResult, StatusUrl, WILDCARD};
use serde_json::Value;
use tracing::trace;

use crate::node::Node;

/// The tree root plus the global write counter it carries
///
/// The root's revision is the counter: every successful write bumps it by
/// exactly one and stamps the new value on each node from the root down to
/// the write site.
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    root: Node,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            root: Node::container(0),
        }
    }

    pub(crate) fn revision(&self) -> u64 {
        self.root.revision
    }

    /// Walk to an existing node without creating anything
    fn lookup(&self, url: &StatusUrl) -> StatusResult<&Node> {
        let mut node = &self.root;
        for (depth, segment) in url.segments().iter().enumerate() {
            let children = node.children().ok_or_else(|| StatusError::NotContainer {
                url: prefix(url, depth),
            })?;
            node = children.get(segment).ok_or_else(|| StatusError::NotFound {
                url: prefix(url, depth + 1),
            })?;
        }
        Ok(node)
    }

    pub(crate) fn get(&self, url: &StatusUrl) -> StatusResult<Entry> {
        let node = self.lookup(url)?;
        Ok(Entry::new(node.revision, node.to_value()))
    }

    /// Revision of the target, None if it does not exist yet
    ///
    /// Fails if an existing ancestor cannot hold children, which is the only
    /// obstacle to materializing the missing part of the path.
    fn probe(&self, url: &StatusUrl) -> StatusResult<Option<u64>> {
        let mut node = &self.root;
        for (depth, segment) in url.segments().iter().enumerate() {
            let children = node.children().ok_or_else(|| StatusError::NotContainer {
                url: prefix(url, depth),
            })?;
            match children.get(segment) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node.revision))
    }

    /// Write `value` at `url`, materializing missing containers on the way
    ///
    /// All checks run before anything is touched, so a failed call leaves
    /// the tree exactly as it was.
    pub(crate) fn set(
        &mut self,
        url: &StatusUrl,
        value: Value,
        expected: Revision,
    ) -> StatusResult<u64> {
        let current = self.probe(url)?;
        check_revision(url, expected, current)?;

        let revision = self.root.revision + 1;
        let node = Node::from_value(value, revision, &url.to_string())?;

        let Some((name, parents)) = url.segments().split_last() else {
            self.root = node;
            return Ok(revision);
        };

        let parent = self.stamp_path(url, parents, revision, true)?;
        parent.insert(name.clone(), node);
        trace!(%url, revision, created = current.is_none(), "Committed write");
        Ok(revision)
    }

    /// Delete the node at `url`; removing the root resets it to null
    pub(crate) fn remove(&mut self, url: &StatusUrl, expected: Revision) -> StatusResult<u64> {
        let current = self.lookup(url)?.revision;
        check_revision(url, expected, Some(current))?;

        let revision = self.root.revision + 1;
        let Some((name, parents)) = url.segments().split_last() else {
            self.root = Node::null(revision);
            return Ok(revision);
        };

        let parent = self.stamp_path(url, parents, revision, false)?;
        parent.remove(name);
        trace!(%url, revision, "Committed removal");
        Ok(revision)
    }

    /// Stamp `revision` on the root and every node along `parents`
    ///
    /// Returns the children of the last node so the caller can attach or
    /// detach the write site. Only called after validation, so the type
    /// checks below cannot fail on a path that `probe`/`lookup` accepted.
    fn stamp_path(
        &mut self,
        url: &StatusUrl,
        parents: &[String],
        revision: u64,
        create: bool,
    ) -> StatusResult<&mut std::collections::BTreeMap<String, Node>> {
        let mut node = &mut self.root;
        node.revision = revision;
        for (depth, segment) in parents.iter().enumerate() {
            let children = node.children_mut().ok_or_else(|| StatusError::NotContainer {
                url: prefix(url, depth),
            })?;
            node = if create {
                children
                    .entry(segment.clone())
                    .or_insert_with(|| Node::container(revision))
            } else {
                children.get_mut(segment).ok_or_else(|| StatusError::NotFound {
                    url: prefix(url, depth + 1),
                })?
            };
            node.revision = revision;
        }
        node.children_mut().ok_or_else(|| StatusError::NotContainer {
            url: prefix(url, parents.len()),
        })
    }

    /// Resolve a pattern against the current tree
    ///
    /// Literal segments must match an existing child, `*` branches over all
    /// children. Matches are collected at exactly the pattern's depth. A
    /// pattern without wildcards behaves like `get` keyed by `key`; missing
    /// paths produce an empty mapping rather than an error.
    pub(crate) fn expand(&self, pattern: &StatusUrl, key: &str) -> Matches {
        let mut matches = Matches::new();

        if !pattern.has_wildcard() {
            if let Ok(node) = self.lookup(pattern) {
                matches.insert(key.to_string(), Entry::new(node.revision, node.to_value()));
            }
            return matches;
        }

        let mut path = Vec::with_capacity(pattern.segments().len());
        collect(
            &self.root,
            pattern.scheme(),
            pattern.segments(),
            &mut path,
            &mut matches,
        );
        matches
    }
}

fn collect<'a>(
    node: &'a Node,
    scheme: &str,
    remaining: &[String],
    path: &mut Vec<&'a str>,
    matches: &mut Matches,
) {
    let Some((segment, rest)) = remaining.split_first() else {
        let url = format!("{}://{}", scheme, path.join("/"));
        matches.insert(url, Entry::new(node.revision, node.to_value()));
        return;
    };

    let Some(children) = node.children() else {
        return;
    };

    if segment == WILDCARD {
        for (name, child) in children {
            path.push(name);
            collect(child, scheme, rest, path, matches);
            path.pop();
        }
    } else if let Some((name, child)) = children.get_key_value(segment) {
        path.push(name);
        collect(child, scheme, rest, path, matches);
        path.pop();
    }
}

fn check_revision(url: &StatusUrl, expected: Revision, current: Option<u64>) -> StatusResult<()> {
    match expected {
        Revision::Unchecked => Ok(()),
        Revision::MustNotExist if current.is_none() => Ok(()),
        Revision::MustNotExist => Err(StatusError::AlreadyExists {
            url: url.to_string(),
        }),
        Revision::Exact(expected) => {
            let actual = current.unwrap_or(0);
            if expected == actual {
                Ok(())
            } else {
                Err(StatusError::RevisionMismatch {
                    url: url.to_string(),
                    expected,
                    actual,
                })
            }
        }
    }
}

/// Render the first `depth` segments of `url`
fn prefix(url: &StatusUrl, depth: usize) -> String {
    format!("{}://{}", url.scheme(), url.segments()[..depth].join("/"))
}
