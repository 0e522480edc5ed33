//! Store schema: component keys grouped into contiguous per-reactor slices.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use crate::error::{StoreError, StoreResult};

/// A `"<group>:<element>"` component name, parsed once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub group: String,
    pub element: String,
}

impl ComponentKey {
    /// Split at the first `:`. Both halves must be non-empty and comma-free.
    pub fn parse(key: &str) -> StoreResult<Self> {
        let invalid = |what| StoreError::InvalidKey {
            key: key.to_string(),
            what,
        };
        if key.contains(',') {
            return Err(invalid("keys must not contain ','"));
        }
        let (group, element) = key
            .split_once(':')
            .ok_or_else(|| invalid("expected <group>:<element>"))?;
        if group.is_empty() || element.is_empty() {
            return Err(invalid("group and element must be non-empty"));
        }
        Ok(Self {
            group: group.to_string(),
            element: element.to_string(),
        })
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.element)
    }
}

/// Key layout of a state vector.
///
/// `ukeys[g]` owns the half-open slot range `slices[g]`; `elements` is aligned
/// with `keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    keys: Vec<String>,
    ukeys: Vec<String>,
    elements: Vec<String>,
    slices: Vec<Range<usize>>,
}

impl Schema {
    /// Derive groups and slices from raw keys.
    ///
    /// Groups appear in first-seen order. A group that reappears after
    /// another group started is rejected since its slots would not be
    /// contiguous, and so is a key that repeats inside its group.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> StoreResult<Self> {
        if keys.is_empty() {
            return Err(StoreError::InvalidArg {
                what: "store needs at least one key",
            });
        }

        let mut ukeys: Vec<String> = Vec::new();
        let mut elements = Vec::with_capacity(keys.len());
        let mut slices: Vec<Range<usize>> = Vec::new();

        for (slot, raw) in keys.iter().enumerate() {
            let key = ComponentKey::parse(raw.as_ref())?;
            match ukeys.last() {
                Some(last) if *last == key.group => {
                    if let Some(slice) = slices.last_mut() {
                        if elements[slice.clone()].contains(&key.element) {
                            return Err(StoreError::InvalidKey {
                                key: raw.as_ref().to_string(),
                                what: "duplicate key",
                            });
                        }
                        slice.end = slot + 1;
                    }
                }
                _ => {
                    if ukeys.contains(&key.group) {
                        return Err(StoreError::InvalidKey {
                            key: raw.as_ref().to_string(),
                            what: "group slots are not contiguous",
                        });
                    }
                    ukeys.push(key.group);
                    slices.push(slot..slot + 1);
                }
            }
            elements.push(key.element);
        }

        Ok(Self {
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            ukeys,
            elements,
            slices,
        })
    }

    /// Rebuild a schema from persisted parts, checking their consistency.
    pub fn from_parts(
        keys: Vec<String>,
        ukeys: Vec<String>,
        elements: Vec<String>,
        slices: Vec<Range<usize>>,
    ) -> StoreResult<Self> {
        if keys.len() != elements.len() {
            return Err(StoreError::corrupt(format!(
                "{} keys but {} elements",
                keys.len(),
                elements.len()
            )));
        }
        if ukeys.len() != slices.len() {
            return Err(StoreError::corrupt(format!(
                "{} groups but {} slices",
                ukeys.len(),
                slices.len()
            )));
        }

        let mut next = 0;
        for (group, slice) in ukeys.iter().zip(&slices) {
            if slice.start != next || slice.end <= slice.start {
                return Err(StoreError::corrupt(format!(
                    "slice {}..{} of group '{group}' is not contiguous",
                    slice.start, slice.end
                )));
            }
            next = slice.end;
        }
        if next != keys.len() {
            return Err(StoreError::corrupt(format!(
                "slice lengths sum to {next}, state has {} slots",
                keys.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = ukeys.iter().find(|g| !seen.insert(g.as_str())) {
            return Err(StoreError::corrupt(format!("duplicate group '{dup}'")));
        }

        // recomputing from keys must reproduce the persisted grouping exactly
        let derived = Self::from_keys(&keys).map_err(|e| StoreError::corrupt(e.to_string()))?;
        if derived.ukeys != ukeys || derived.slices != slices || derived.elements != elements {
            return Err(StoreError::corrupt(
                "groups, slices or elements disagree with keys",
            ));
        }

        Ok(derived)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn ukeys(&self) -> &[String] {
        &self.ukeys
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn slices(&self) -> &[Range<usize>] {
        &self.slices
    }

    /// Number of state slots.
    pub fn width(&self) -> usize {
        self.keys.len()
    }

    pub fn group_index(&self, group: &str) -> Option<usize> {
        self.ukeys.iter().position(|g| g == group)
    }

    /// Column of `element` inside group `group`'s own slice.
    pub fn column(&self, group: usize, element: &str) -> Option<usize> {
        let slice = self.slices.get(group)?;
        self.elements[slice.clone()]
            .iter()
            .position(|e| e == element)
    }
}
