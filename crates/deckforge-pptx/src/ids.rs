//! Deck-wide shape id allocation.
//!
//! Template slides routinely share shape ids, and one template may be copied
//! several times into the same deck. Every copied slide therefore gets fresh
//! ids from a single counter, so that no two shapes in the output deck share
//! an id. Intra-slide references (connector endpoints, animation targets)
//! are rewritten through the same mapping.

use std::collections::HashMap;

use deckforge_ooxml::XmlElement;

/// Attributes that point at a shape id elsewhere on the same slide
const SHAPE_REF_ATTRS: &[&str] = &["spid"];

/// Elements whose `id` attribute is a shape reference, not a definition
const SHAPE_REF_ELEMENTS: &[&str] = &["stCxn", "endCxn"];

/// Hands out shape ids that are unique across one output deck
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next shape will receive
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Renumber every shape of one slide in document order
    ///
    /// Returns the `old -> new` mapping used for references. When a template
    /// reuses an id, references resolve to its first holder.
    pub fn renumber(&mut self, slide_root: &mut XmlElement) -> HashMap<u32, u32> {
        let mut mapping = HashMap::new();

        slide_root.walk_mut(&mut |element| {
            if element.local_name() != "cNvPr" {
                return;
            }
            let new_id = self.next;
            self.next += 1;
            if let Some(old_id) = element.attr("id").and_then(|id| id.trim().parse::<u32>().ok()) {
                mapping.entry(old_id).or_insert(new_id);
            }
            element.set_attr("id", new_id.to_string());
        });

        remap_references(slide_root, &mapping);
        mapping
    }
}

fn remap_references(slide_root: &mut XmlElement, mapping: &HashMap<u32, u32>) {
    slide_root.walk_mut(&mut |element| {
        let keys: &[&str] = if SHAPE_REF_ELEMENTS.contains(&element.local_name()) {
            &["id"]
        } else {
            SHAPE_REF_ATTRS
        };

        for (key, value) in element.attributes.iter_mut() {
            let local = key.rsplit_once(':').map(|(_, l)| l).unwrap_or(key);
            if !keys.contains(&local) {
                continue;
            }
            if let Some(new_id) = value.trim().parse::<u32>().ok().and_then(|old| mapping.get(&old)) {
                *value = new_id.to_string();
            }
        }
    });
}
