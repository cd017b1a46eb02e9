//! Editing session over a field tree.
//!
//! [`FieldTree`] exclusively owns the root field list. Every operation either
//! completes or returns an [`EditError`] with the tree left exactly as it was.
//! Structural edits relink `level`/`parent_id` for the whole tree afterwards;
//! those are derived data and never drive mutation.
//!
//! The flat view ([`FieldTree::flatten`]) is what an interactive list shows:
//! pre-order rows, plus one placeholder row after the children of every
//! expanded container to act as an "append into this container" drop target.

use crate::config::{ConfigError, EngineConfig};
use crate::field::*;
use crate::parser::{parse_discriminant, ParseError};
use crate::transform::{self, SchemaError};
use crate::validate::{self, Violation};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("no field with id {0}")]
    NotFound(FieldId),
    #[error("no field at flat index {0}")]
    NoFieldAtIndex(usize),
    #[error("field {0} cannot hold children")]
    NotAContainer(FieldId),
    #[error("array {0} already has an element")]
    ArrayHasElement(FieldId),
    #[error("a command branch needs a discriminant key")]
    MissingDiscriminant,
    #[error("discriminant `{0}` already exists")]
    DuplicateDiscriminant(String),
    #[error(transparent)]
    InvalidDiscriminant(#[from] ParseError),
    #[error("reorder discarded: expected {expected} fields, found {found}")]
    ReorderCountMismatch { expected: usize, found: usize },
    #[error("reorder discarded: field {0} is unknown or listed twice")]
    ReorderUnknownField(FieldId),
    #[error("name must not be empty")]
    EmptyName,
    #[error("`{0}` is not a valid field name")]
    InvalidName(String),
    #[error("name already exists: `{0}`")]
    NameExists(String),
    #[error("id {0} is already in the tree")]
    DuplicateId(FieldId),
    #[error("field {0} cannot be duplicated in place")]
    CannotDuplicate(FieldId),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn rejected(op: &'static str, err: EditError) -> EditError {
    warn!(op, %err, "edit rejected");
    err
}

/// One row of the flat view.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatEntry {
    Field(FlatField),
    /// Drop target after the children of an expanded container.
    Placeholder { parent_id: FieldId, level: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    pub id: FieldId,
    pub name: String,
    pub field_type: FieldType,
    pub level: usize,
    pub expanded: bool,
    pub parent_id: Option<FieldId>,
    /// Discriminant when this row is a command branch. Reorder uses it to
    /// place the node back into a command.
    pub case_key: Option<String>,
}

impl FlatEntry {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, FlatEntry::Placeholder { .. })
    }

    pub fn level(&self) -> usize {
        match self {
            FlatEntry::Field(f) => f.level,
            FlatEntry::Placeholder { level, .. } => *level,
        }
    }

    pub fn as_field(&self) -> Option<&FlatField> {
        match self {
            FlatEntry::Field(f) => Some(f),
            FlatEntry::Placeholder { .. } => None,
        }
    }
}

/// Next free generated name for `ty` given the names in use: `base` followed by
/// one more than the largest numeric suffix seen. Freed suffixes are never reused.
pub fn next_unique_name<'a>(names: impl IntoIterator<Item = &'a str>, ty: FieldType) -> String {
    let base = ty.base_name();
    let taken: HashSet<&str> = names.into_iter().collect();
    let max = taken
        .iter()
        .filter_map(|n| n.strip_prefix(base))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u128>().ok())
        .max()
        .unwrap_or(0);
    let mut name = match max.checked_add(1) {
        Some(next) => format!("{}{}", base, next),
        // past u128: longer digit runs stay above every parsed suffix
        None => format!("{}{}1", base, max),
    };
    while taken.contains(name.as_str()) {
        name.push('1');
    }
    name
}

#[derive(Debug, Clone)]
pub struct FieldTree {
    roots: Vec<FieldNode>,
    config: EngineConfig,
}

impl Default for FieldTree {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FieldTree {
    pub fn new(roots: Vec<FieldNode>) -> Self {
        Self::with_config(roots, EngineConfig::default())
    }

    pub fn with_config(roots: Vec<FieldNode>, config: EngineConfig) -> Self {
        let mut tree = FieldTree { roots, config };
        tree.relink();
        tree
    }

    /// Load a canonical schema document (array of fields or `{ "fields": [...] }`).
    pub fn from_canonical(doc: &Json, config: EngineConfig) -> Result<Self, SchemaError> {
        Ok(Self::with_config(transform::to_editing_schema(doc)?, config))
    }

    pub fn roots(&self) -> &[FieldNode] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<FieldNode> {
        self.roots
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn to_canonical(&self) -> Json {
        transform::canonical_json(&self.roots)
    }

    pub fn validate(&self) -> Vec<Violation> {
        validate::validate_schema(&self.roots, &self.config)
    }

    /// Recompute `level` and `parent_id` everywhere.
    pub fn relink(&mut self) {
        for root in &mut self.roots {
            root.relink(0, None);
        }
    }

    // ---------- lookups ----------

    pub fn find(&self, id: &FieldId) -> Option<&FieldNode> {
        self.roots.iter().find_map(|r| r.find(id))
    }

    pub fn find_mut(&mut self, id: &FieldId) -> Option<&mut FieldNode> {
        self.roots.iter_mut().find_map(|r| r.find_mut(id))
    }

    /// Owning container of `id`; `None` for roots and unknown ids.
    pub fn parent_of(&self, id: &FieldId) -> Option<&FieldNode> {
        fn search<'a>(node: &'a FieldNode, id: &FieldId) -> Option<&'a FieldNode> {
            let children = node.children();
            if children.iter().any(|c| &c.id == id) {
                return Some(node);
            }
            children.into_iter().find_map(|c| search(c, id))
        }
        self.roots.iter().find_map(|r| search(r, id))
    }

    /// Every name in the tree, in pre-order.
    pub fn all_names(&self) -> Vec<String> {
        collect_names(&self.roots)
    }

    fn contains_id(&self, id: &FieldId) -> bool {
        self.find(id).is_some()
    }

    // ---------- creation ----------

    pub fn unique_name(&self, ty: FieldType) -> String {
        let names = self.all_names();
        next_unique_name(names.iter().map(String::as_str), ty)
    }

    /// Fresh node of type `ty` with defaults and a unique generated name.
    /// Not yet part of the tree.
    pub fn create_field(&self, ty: FieldType) -> FieldNode {
        let mut node = new_field(ty).named(&self.unique_name(ty));
        if ty == FieldType::Checksum {
            node.kind = FieldKind::Checksum(checksum_attrs(&self.config.default_checksum_algorithm));
        }
        node
    }

    /// An incoming subtree must not reuse a name or id, either one already in
    /// the tree or one used earlier in the subtree itself.
    fn check_incoming(&self, node: &FieldNode) -> Result<(), EditError> {
        let mut names: HashSet<String> = self.all_names().into_iter().collect();
        let mut ids: HashSet<FieldId> = HashSet::new();
        let mut result = Ok(());
        node.walk(&mut |n| {
            if result.is_err() {
                return;
            }
            if !n.name.is_empty() && !names.insert(n.name.clone()) {
                result = Err(EditError::NameExists(n.name.clone()));
            } else if self.contains_id(&n.id) || !ids.insert(n.id.clone()) {
                result = Err(EditError::DuplicateId(n.id.clone()));
            }
        });
        result
    }

    pub fn push_root(&mut self, node: FieldNode) -> Result<FieldId, EditError> {
        self.check_incoming(&node)
            .map_err(|e| rejected("push_root", e))?;
        let id = node.id.clone();
        self.roots.push(node);
        self.relink();
        debug!(%id, "field appended at root");
        Ok(id)
    }

    // ---------- insertion ----------

    /// Insert `child` into the container `parent_id`.
    ///
    /// - `Struct`: appended.
    /// - `Array`: becomes the element; rejected when one already exists.
    /// - `Command`: stored under `key`, which must be a well-formed discriminant
    ///   not already used by the command.
    ///
    /// The parent is expanded on success.
    pub fn add_to_container(
        &mut self,
        parent_id: &FieldId,
        child: FieldNode,
        key: Option<&str>,
    ) -> Result<FieldId, EditError> {
        self.try_add_to_container(parent_id, child, key)
            .map_err(|e| rejected("add_to_container", e))
    }

    fn try_add_to_container(
        &mut self,
        parent_id: &FieldId,
        child: FieldNode,
        key: Option<&str>,
    ) -> Result<FieldId, EditError> {
        self.check_incoming(&child)?;
        let parent = self
            .find_mut(parent_id)
            .ok_or_else(|| EditError::NotFound(parent_id.clone()))?;
        if parent.field_type() == FieldType::Command {
            let key = key.map(str::trim).filter(|k| !k.is_empty());
            parse_discriminant(key.ok_or(EditError::MissingDiscriminant)?)?;
        }
        let id = child.id.clone();
        attach(parent, child, key)?;
        parent.expanded = true;
        self.relink();
        debug!(%id, parent = %parent_id, "field added to container");
        Ok(id)
    }

    /// Insert at a row of the flat view.
    ///
    /// - placeholder row: added to that placeholder's container;
    /// - field row inside a struct (or at root): spliced before that field;
    /// - field row inside an array or command: added to that container
    ///   (`key` is the branch discriminant for commands);
    /// - out of range: appended at root.
    pub fn insert_at_flat_index(
        &mut self,
        index: usize,
        node: FieldNode,
        key: Option<&str>,
    ) -> Result<FieldId, EditError> {
        let flat = self.flatten();
        match flat.get(index) {
            Some(FlatEntry::Placeholder { parent_id, .. }) => {
                self.add_to_container(parent_id, node, key)
            }
            Some(FlatEntry::Field(target)) => {
                let routed = self
                    .parent_of(&target.id)
                    .filter(|p| p.field_type() != FieldType::Struct)
                    .map(|p| p.id.clone());
                match routed {
                    Some(parent_id) => self.add_to_container(&parent_id, node, key),
                    None => self
                        .try_insert_before(&target.id, node)
                        .map_err(|e| rejected("insert_at_flat_index", e)),
                }
            }
            None => self.push_root(node),
        }
    }

    fn try_insert_before(&mut self, target: &FieldId, node: FieldNode) -> Result<FieldId, EditError> {
        self.check_incoming(&node)?;
        let parent_id = self.parent_of(target).map(|p| p.id.clone());
        let list = match &parent_id {
            Some(pid) => match self.find_mut(pid).map(|p| &mut p.kind) {
                Some(FieldKind::Struct(s)) => &mut s.fields,
                _ => return Err(EditError::NotAContainer(pid.clone())),
            },
            None => &mut self.roots,
        };
        let pos = list
            .iter()
            .position(|f| &f.id == target)
            .ok_or_else(|| EditError::NotFound(target.clone()))?;
        let id = node.id.clone();
        list.insert(pos, node);
        self.relink();
        debug!(%id, before = %target, "field inserted");
        Ok(id)
    }

    // ---------- flat view ----------

    pub fn flatten(&self) -> Vec<FlatEntry> {
        let mut out = Vec::new();
        for root in &self.roots {
            flatten_into(root, 0, None, None, &mut out);
        }
        out
    }

    /// Apply a reordered flat view (as produced by dragging rows of
    /// [`flatten`](Self::flatten)). The reordered list must contain exactly the
    /// fields currently visible, each once; otherwise nothing changes.
    ///
    /// Levels are recomputed from the order alone: a placeholder closes the
    /// running container, an expanded container opens one. The tree is then
    /// rebuilt with a level stack. Collapsed containers move with their subtree.
    pub fn reorder(&mut self, entries: &[FlatEntry]) -> Result<(), EditError> {
        self.try_reorder(entries)
            .map_err(|e| rejected("reorder", e))
    }

    fn try_reorder(&mut self, entries: &[FlatEntry]) -> Result<(), EditError> {
        let current: Vec<FieldId> = self
            .flatten()
            .into_iter()
            .filter_map(|e| e.as_field().map(|f| f.id.clone()))
            .collect();
        let found = entries.iter().filter(|e| !e.is_placeholder()).count();
        if found != current.len() {
            return Err(EditError::ReorderCountMismatch {
                expected: current.len(),
                found,
            });
        }

        let mut nodes = HashMap::new();
        for root in self.roots.iter().cloned() {
            detach(root, &mut nodes);
        }

        let mut running = 0usize;
        let mut placed = Vec::with_capacity(found);
        for entry in entries {
            match entry {
                FlatEntry::Placeholder { .. } => running = running.saturating_sub(1),
                FlatEntry::Field(f) => {
                    let node = nodes
                        .remove(&f.id)
                        .ok_or_else(|| EditError::ReorderUnknownField(f.id.clone()))?;
                    let opens = node.expanded && node.is_container();
                    placed.push((node, running, f.case_key.clone()));
                    if opens {
                        running += 1;
                    }
                }
            }
        }

        self.roots = rebuild(placed)?;
        self.relink();
        debug!(fields = found, "fields reordered");
        Ok(())
    }

    // ---------- removal ----------

    /// Remove `id` with its whole subtree.
    pub fn remove(&mut self, id: &FieldId) -> Result<FieldNode, EditError> {
        let removed = remove_from_list(&mut self.roots, id)
            .ok_or_else(|| rejected("remove", EditError::NotFound(id.clone())))?;
        self.relink();
        debug!(%id, "field removed");
        Ok(removed)
    }

    /// Remove the field shown at flat row `index` and adjust a row selection:
    /// cleared when it pointed into the removed rows, shifted up when it was below them.
    pub fn remove_at_flat_index(
        &mut self,
        index: usize,
        selection: Option<usize>,
    ) -> Result<(FieldNode, Option<usize>), EditError> {
        let before = self.flatten();
        let id = match before.get(index) {
            Some(FlatEntry::Field(f)) => f.id.clone(),
            _ => {
                return Err(rejected(
                    "remove_at_flat_index",
                    EditError::NoFieldAtIndex(index),
                ))
            }
        };
        let removed = self.remove(&id)?;
        let rows = before.len() - self.flatten().len();
        let selection = selection.and_then(|sel| {
            if sel < index {
                Some(sel)
            } else if sel < index + rows {
                None
            } else {
                Some(sel - rows)
            }
        });
        Ok((removed, selection))
    }

    // ---------- field edits ----------

    /// Flip `expanded` on one node. Descendants keep their own state.
    pub fn toggle_expanded(&mut self, id: &FieldId) -> Result<bool, EditError> {
        let node = self
            .find_mut(id)
            .ok_or_else(|| rejected("toggle_expanded", EditError::NotFound(id.clone())))?;
        node.expanded = !node.expanded;
        Ok(node.expanded)
    }

    /// Rename a field. The name is trimmed and must match the configured
    /// identifier pattern and be unused elsewhere in the tree.
    pub fn rename(&mut self, id: &FieldId, new_name: &str) -> Result<(), EditError> {
        self.try_rename(id, new_name)
            .map_err(|e| rejected("rename", e))
    }

    fn try_rename(&mut self, id: &FieldId, new_name: &str) -> Result<(), EditError> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(EditError::EmptyName);
        }
        if !self.config.identifier_regex()?.is_match(name) {
            return Err(EditError::InvalidName(name.to_string()));
        }
        let current = self
            .find(id)
            .ok_or_else(|| EditError::NotFound(id.clone()))?;
        if current.name == name {
            return Ok(());
        }
        if self.all_names().iter().any(|n| n == name) {
            return Err(EditError::NameExists(name.to_string()));
        }
        if let Some(node) = self.find_mut(id) {
            debug!(%id, from = %node.name, to = name, "field renamed");
            node.name = name.to_string();
        }
        Ok(())
    }

    /// Deep-copy `id` right after itself, with fresh ids and generated names
    /// for every named node of the copy.
    pub fn duplicate(&mut self, id: &FieldId) -> Result<FieldId, EditError> {
        self.try_duplicate(id)
            .map_err(|e| rejected("duplicate", e))
    }

    fn try_duplicate(&mut self, id: &FieldId) -> Result<FieldId, EditError> {
        let original = self
            .find(id)
            .ok_or_else(|| EditError::NotFound(id.clone()))?;
        let mut copy = original.clone();
        copy.assign_fresh_ids();
        let mut names = self.all_names();
        rename_generated(&mut copy, &mut names);

        let parent_id = self.parent_of(id).map(|p| p.id.clone());
        let list = match &parent_id {
            Some(pid) => match self.find_mut(pid).map(|p| &mut p.kind) {
                Some(FieldKind::Struct(s)) => &mut s.fields,
                _ => return Err(EditError::CannotDuplicate(id.clone())),
            },
            None => &mut self.roots,
        };
        let pos = list
            .iter()
            .position(|f| &f.id == id)
            .ok_or_else(|| EditError::NotFound(id.clone()))?;
        let new_id = copy.id.clone();
        list.insert(pos + 1, copy);
        self.relink();
        debug!(%id, copy = %new_id, "field duplicated");
        Ok(new_id)
    }
}

fn flatten_into(
    node: &FieldNode,
    level: usize,
    parent: Option<&FieldId>,
    case_key: Option<&str>,
    out: &mut Vec<FlatEntry>,
) {
    out.push(FlatEntry::Field(FlatField {
        id: node.id.clone(),
        name: node.name.clone(),
        field_type: node.field_type(),
        level,
        expanded: node.expanded,
        parent_id: parent.cloned(),
        case_key: case_key.map(str::to_string),
    }));
    if !(node.expanded && node.is_container()) {
        return;
    }
    for child in node.children() {
        flatten_into(child, level + 1, Some(&node.id), node.case_key_of(&child.id), out);
    }
    out.push(FlatEntry::Placeholder {
        parent_id: node.id.clone(),
        level: level + 1,
    });
}

/// Store `child` in `parent`'s owning slot.
fn attach(parent: &mut FieldNode, child: FieldNode, key: Option<&str>) -> Result<(), EditError> {
    let parent_id = parent.id.clone();
    match &mut parent.kind {
        FieldKind::Struct(s) => s.fields.push(child),
        FieldKind::Array(a) => {
            if a.element.is_some() {
                return Err(EditError::ArrayHasElement(parent_id));
            }
            a.element = Some(Box::new(child));
        }
        FieldKind::Command(c) => {
            let key = key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or(EditError::MissingDiscriminant)?;
            if c.has_key(key) {
                return Err(EditError::DuplicateDiscriminant(key.to_string()));
            }
            c.cases.push(CommandCase {
                key: key.to_string(),
                field: child,
            });
        }
        _ => return Err(EditError::NotAContainer(parent_id)),
    }
    Ok(())
}

fn take_children(node: &mut FieldNode) -> Vec<FieldNode> {
    match &mut node.kind {
        FieldKind::Struct(s) => std::mem::take(&mut s.fields),
        FieldKind::Array(a) => a.element.take().map(|e| vec![*e]).unwrap_or_default(),
        FieldKind::Command(c) => std::mem::take(&mut c.cases)
            .into_iter()
            .map(|c| c.field)
            .collect(),
        _ => Vec::new(),
    }
}

/// Split the tree into its visible rows: expanded containers give up their
/// children (which are rows themselves), collapsed ones keep them.
fn detach(mut node: FieldNode, out: &mut HashMap<FieldId, FieldNode>) {
    if node.expanded && node.is_container() {
        for child in take_children(&mut node) {
            detach(child, out);
        }
    }
    out.insert(node.id.clone(), node);
}

struct Frame {
    node: FieldNode,
    level: usize,
    key: Option<String>,
}

/// Outline → tree: pop while the top's level is >= the current one, attach
/// to the new top (or root), push containers.
fn rebuild(rows: Vec<(FieldNode, usize, Option<String>)>) -> Result<Vec<FieldNode>, EditError> {
    let mut roots = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    for (node, level, key) in rows {
        while stack.last().map_or(false, |f| f.level >= level) {
            close_frame(&mut stack, &mut roots)?;
        }
        if node.is_container() {
            stack.push(Frame { node, level, key });
        } else {
            place(&mut stack, &mut roots, node, key)?;
        }
    }
    while !stack.is_empty() {
        close_frame(&mut stack, &mut roots)?;
    }
    Ok(roots)
}

fn close_frame(stack: &mut Vec<Frame>, roots: &mut Vec<FieldNode>) -> Result<(), EditError> {
    match stack.pop() {
        Some(frame) => place(stack, roots, frame.node, frame.key),
        None => Ok(()),
    }
}

fn place(
    stack: &mut [Frame],
    roots: &mut Vec<FieldNode>,
    node: FieldNode,
    key: Option<String>,
) -> Result<(), EditError> {
    match stack.last_mut() {
        Some(parent) => attach(&mut parent.node, node, key.as_deref()),
        None => {
            roots.push(node);
            Ok(())
        }
    }
}

/// Give every named node of `node` a fresh generated name, recording each in `names`.
fn rename_generated(node: &mut FieldNode, names: &mut Vec<String>) {
    if !node.name.is_empty() {
        let name = next_unique_name(names.iter().map(String::as_str), node.field_type());
        names.push(name.clone());
        node.name = name;
    }
    for child in node.children_mut() {
        rename_generated(child, names);
    }
}
