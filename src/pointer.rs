//! JSON pointer helpers and instance pointer positions.
//!
//! Two kinds of paths flow through the engine:
//! - schema pointers (`/definitions/foo`), which identify schema nodes inside a
//!   schema file, and
//! - pointer positions, ordered name/index steps describing where inside an
//!   *instance* document a schema is being resolved.
use std::fmt;

// ————————————————————————————————————————————————————————————————————————————
// POINTER UTILITIES
// ————————————————————————————————————————————————————————————————————————————

/// Escape a single segment for inclusion in a JSON pointer.
///
/// Blank names are percent-encoded so they survive a round trip through
/// [`split`], which drops empty segments.
pub fn escape(name: &str) -> String {
    if name.trim().is_empty() {
        return urlencoding::encode(name).into_owned();
    }
    name.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape`]: percent sequences first, then `~1` and `~0`.
pub fn unescape(part: &str) -> String {
    let decoded = match urlencoding::decode(part) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => part.to_string(),
    };
    decoded.replace("~1", "/").replace("~0", "~")
}

/// `#`, `#/` and the empty string all point at the document root.
pub fn is_self_reference(reference: Option<&str>) -> bool {
    match reference {
        None => true,
        Some(reference) => reference.is_empty() || reference == "#" || reference == "#/",
    }
}

/// Split a pointer into its non-empty segments.
pub fn split(pointer: &str) -> Vec<&str> {
    pointer.split('/').filter(|part| !part.is_empty()).collect()
}

/// Strip one trailing and one leading `#` from a schema id.
pub fn normalize_id(id: &str) -> &str {
    let id = id.strip_suffix('#').unwrap_or(id);
    id.strip_prefix('#').unwrap_or(id)
}

/// Turn backslashes into slashes and drop leading slashes.
pub fn normalize_slashes(reference: &str) -> String {
    reference.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Child pointer under `parent`. The root pointer is `/`, so its children do
/// not get a doubled slash.
pub fn child_pointer(name: &str, parent: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

// ————————————————————————————————————————————————————————————————————————————
// POINTER POSITION
// ————————————————————————————————————————————————————————————————————————————

/// One step into an instance document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Name(String),
    Index(usize),
}

impl Step {
    pub fn is_from_object(&self) -> bool {
        matches!(self, Step::Name(_))
    }
}

/// Ordered steps from an instance root down to the node being resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PointerPosition {
    steps: Vec<Step>,
}

impl PointerPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Parse an instance pointer such as `/a/0/b`. Purely numeric segments
    /// become index steps.
    pub fn parse(pointer: &str) -> Self {
        let steps = split(pointer)
            .into_iter()
            .map(|part| match part.parse::<usize>() {
                Ok(idx) => Step::Index(idx),
                Err(_) => Step::Name(unescape(part)),
            })
            .collect();
        Self { steps }
    }

    pub fn add_preceding_step(&mut self, step: Step) {
        self.steps.insert(0, step);
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_object(&self, pos: usize) -> bool {
        self.steps.get(pos).is_some_and(Step::is_from_object)
    }

    /// Drop the first `count` steps; `None` when fewer steps remain.
    pub fn skip(&self, count: usize) -> Option<PointerPosition> {
        if count > self.steps.len() {
            return None;
        }
        Some(Self { steps: self.steps[count..].to_vec() })
    }

    pub fn first_name(&self) -> Option<&str> {
        match self.steps.first() {
            Some(Step::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn first_index(&self) -> Option<usize> {
        match self.steps.first() {
            Some(Step::Index(idx)) => Some(*idx),
            _ => None,
        }
    }
}

impl fmt::Display for PointerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            match step {
                Step::Name(name) => write!(f, "/{}", escape(name))?,
                Step::Index(idx) => write!(f, "/{idx}")?,
            }
        }
        Ok(())
    }
}
