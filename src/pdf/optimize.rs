//! Container-level optimizations applied after image transcoding

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::cli::CompressionMode;

/// Trailer entries only meaningful for the cross-reference layout we read
const STALE_TRAILER_KEYS: [&[u8]; 8] = [
    b"Prev",
    b"XRefStm",
    b"Type",
    b"W",
    b"Index",
    b"Filter",
    b"DecodeParms",
    b"Length",
];

/// Save-time options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub compress_streams: bool,
    /// Renumber objects so the first page comes first in the file. No
    /// `/Linearized` dictionary or hint stream is written; lopdf cannot
    /// produce them.
    pub linearize: bool,
    pub strip_metadata: bool,
}

impl OptimizeOptions {
    pub fn for_mode(mode: CompressionMode) -> Self {
        Self {
            compress_streams: true,
            linearize: true,
            strip_metadata: mode.defaults().strip_metadata,
        }
    }
}

/// Prepare a document for saving
pub fn optimize(doc: &mut Document, options: OptimizeOptions) {
    if options.strip_metadata && strip_metadata(doc) {
        log::info!("Removed document metadata");
    }

    for key in STALE_TRAILER_KEYS {
        doc.trailer.remove(key);
    }

    let pruned = doc.prune_objects();
    if !pruned.is_empty() {
        log::debug!("Pruned {} unreferenced objects", pruned.len());
    }

    if options.compress_streams {
        doc.compress();
    }

    if options.linearize {
        reorder_objects(doc);
    }
}

/// Remove the document information dictionary and the catalog's XMP stream.
///
/// Returns whether anything was removed; a document without metadata is fine.
pub fn strip_metadata(doc: &mut Document) -> bool {
    let mut removed = doc.trailer.remove(b"Info").is_some();

    let catalog = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|root| doc.get_object_mut(root))
        .and_then(Object::as_dict_mut);
    if let Ok(catalog) = catalog {
        removed |= catalog.remove(b"Metadata").is_some();
    }

    removed
}

/// Renumber objects so a reader meets the first page as early as possible.
///
/// Order: catalog, then for each page its page-tree ancestors followed by
/// everything the page reaches, then whatever else the catalog and trailer
/// reach, then any leftovers by old number. Dangling references become null.
pub fn reorder_objects(doc: &mut Document) {
    let mut order = ObjectOrder::default();

    let root = doc.trailer.get(b"Root").and_then(Object::as_reference).ok();
    if let Some(root) = root {
        order.push(doc, root);
    }

    for page_id in doc.get_pages().into_values() {
        for ancestor in page_ancestors(doc, page_id).into_iter().rev() {
            order.push(doc, ancestor);
        }
        order.visit(doc, page_id);
    }

    if let Some(root) = root {
        order.visit(doc, root);
    }
    for (_, value) in doc.trailer.iter() {
        if let Ok(id) = value.as_reference() {
            order.visit(doc, id);
        }
    }
    let leftovers: Vec<ObjectId> = doc.objects.keys().copied().collect();
    for id in leftovers {
        order.push(doc, id);
    }

    let mapping: HashMap<ObjectId, ObjectId> = order
        .ids
        .iter()
        .enumerate()
        .map(|(index, old)| (*old, (index as u32 + 1, 0)))
        .collect();

    let mut renumbered = BTreeMap::new();
    for (old, mut object) in std::mem::take(&mut doc.objects) {
        if let Some(new) = mapping.get(&old) {
            remap_object(&mut object, &mapping);
            renumbered.insert(*new, object);
        }
    }
    remap_dict(&mut doc.trailer, &mapping);

    doc.max_id = renumbered.len() as u32;
    doc.objects = renumbered;
}

/// Page-tree nodes above a page, nearest first
fn page_ancestors(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut ancestors = Vec::new();
    let mut current = page_id;
    while let Ok(parent) = doc
        .get_dictionary(current)
        .and_then(|node| node.get(b"Parent"))
        .and_then(Object::as_reference)
    {
        if ancestors.contains(&parent) || parent == page_id {
            break;
        }
        ancestors.push(parent);
        current = parent;
    }
    ancestors
}

#[derive(Default)]
struct ObjectOrder {
    ids: Vec<ObjectId>,
    placed: HashSet<ObjectId>,
    expanded: HashSet<ObjectId>,
}

impl ObjectOrder {
    fn push(&mut self, doc: &Document, id: ObjectId) {
        if doc.objects.contains_key(&id) && self.placed.insert(id) {
            self.ids.push(id);
        }
    }

    /// Place `start` and, depth first, everything it references.
    /// `/Parent` links are not followed so a page does not pull in its siblings.
    fn visit(&mut self, doc: &Document, start: ObjectId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            self.push(doc, id);
            if !self.expanded.insert(id) {
                continue;
            }
            if let Ok(object) = doc.get_object(id) {
                let mut children = Vec::new();
                collect_references(object, &mut children);
                stack.extend(children.into_iter().rev());
            }
        }
    }
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        Object::Dictionary(dict) => collect_dict_references(dict, out),
        Object::Stream(stream) => collect_dict_references(&stream.dict, out),
        _ => {}
    }
}

fn collect_dict_references(dict: &Dictionary, out: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            collect_references(value, out);
        }
    }
}

fn remap_object(object: &mut Object, mapping: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => match mapping.get(id) {
            Some(new) => *id = *new,
            None => *object = Object::Null,
        },
        Object::Array(items) => items.iter_mut().for_each(|item| remap_object(item, mapping)),
        Object::Dictionary(dict) => remap_dict(dict, mapping),
        Object::Stream(stream) => remap_dict(&mut stream.dict, mapping),
        _ => {}
    }
}

fn remap_dict(dict: &mut Dictionary, mapping: &HashMap<ObjectId, ObjectId>) {
    for (_, value) in dict.iter_mut() {
        remap_object(value, mapping);
    }
}
