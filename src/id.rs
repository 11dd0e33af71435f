//! ID Allocator
//!
//! Produces opaque 12-character identifiers from a structured key.
//! Equal keys always resolve to the same id; unequal keys that hash to
//! the same starting slot are pushed to the next free slot by linear
//! probing, exactly like the originating implementation's
//! `generate_id` (which probes `id_num += 1` until a free or
//! structurally-equal slot is found).
//!
//! Allocator state is owned by one pipeline invocation (no process-wide
//! globals), so two independent compiles never see each other's ids.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

const ALPHABET: &[u8; 64] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$";

/// Stable, process-local handle for a scope record. Assigned in
/// creation order by `IdAllocator::fresh_scope_id`, never reused.
pub type ScopeId = u64;

/// Structured key fed to the allocator. Two keys that are `Eq` must
/// resolve to the same id; two keys that are `!Eq` must resolve to
/// different ids even if they hash to the same probe slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdKey {
    /// A scalar variable declared in a given lowerer scope.
    Variable { scope: ScopeId, name: String },
    /// A list variable declared in a given lowerer scope.
    List { scope: ScopeId, name: String },
    /// The well-known sentinel scalar used to discriminate clones.
    CloneDiscriminator,
    /// One clone statement's sentinel value. `site` disambiguates
    /// textually-identical `clone { ... }` statements from each other;
    /// it is a serial number stamped on the AST node at parse time,
    /// not derived from source text, matching the original's use of
    /// Python object identity (`id(self)`) for the same purpose.
    CloneSite { site: u64 },
    /// A user-defined procedure, keyed by name and declaring scope
    /// (arity is folded into `name` mangling at the call site, not
    /// here, since a procedure name is unique per scope regardless of
    /// parameter count in this language).
    Procedure { scope: ScopeId, name: String },
    /// One parameter of a user-defined procedure.
    Argument {
        scope: ScopeId,
        proc_name: String,
        param: String,
    },
    /// A freshly lowered stage block, keyed by the serial AST site
    /// that produced it.
    Block { site: u64 },
}

pub struct IdAllocator {
    by_key: HashMap<IdKey, String>,
    by_slot: HashMap<u64, IdKey>,
    next_scope_id: ScopeId,
    next_site: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            by_slot: HashMap::new(),
            next_scope_id: 0,
            next_site: 0,
        }
    }

    /// Allocate a fresh, never-reused scope handle.
    pub fn fresh_scope_id(&mut self) -> ScopeId {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        id
    }

    /// Allocate a fresh AST-site serial, used to build `IdKey::Block`
    /// and `IdKey::CloneSite` keys that must stay distinct per source
    /// occurrence regardless of structural similarity.
    pub fn fresh_site(&mut self) -> u64 {
        let id = self.next_site;
        self.next_site += 1;
        id
    }

    /// Resolve `key` to its 12-character id, allocating one if this is
    /// the first time `key` has been seen.
    pub fn id_for(&mut self, key: IdKey) -> String {
        if let Some(existing) = self.by_key.get(&key) {
            return existing.clone();
        }
        let mut slot = seed(&key);
        loop {
            match self.by_slot.get(&slot) {
                None => break,
                Some(occupant) if *occupant == key => break,
                Some(_) => slot = slot.wrapping_add(1),
            }
        }
        self.by_slot.insert(slot, key.clone());
        let encoded = encode(slot);
        self.by_key.insert(key, encoded.clone());
        encoded
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn seed(key: &IdKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Little-endian base-64 encoding of `value` over the 64-symbol
/// alphabet, always 12 characters: 11 digits fully cover a 64-bit
/// value (64 / 6 = 10.67), so the 12th (most-significant) digit is
/// always the padding digit `'0'`.
fn encode(mut value: u64) -> String {
    let mut chars = [0u8; 12];
    for slot in chars.iter_mut() {
        *slot = ALPHABET[(value & 0x3F) as usize];
        value >>= 6;
    }
    String::from_utf8(chars.to_vec()).expect("alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_map_to_the_same_id() {
        let mut alloc = IdAllocator::new();
        let k1 = IdKey::Variable { scope: 0, name: "x".into() };
        let k2 = IdKey::Variable { scope: 0, name: "x".into() };
        assert_eq!(alloc.id_for(k1), alloc.id_for(k2));
    }

    #[test]
    fn unequal_keys_map_to_different_ids() {
        let mut alloc = IdAllocator::new();
        let a = alloc.id_for(IdKey::Variable { scope: 0, name: "x".into() });
        let b = alloc.id_for(IdKey::Variable { scope: 0, name: "y".into() });
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_always_twelve_chars_from_the_alphabet() {
        let mut alloc = IdAllocator::new();
        for i in 0..50 {
            let id = alloc.id_for(IdKey::Block { site: i });
            assert_eq!(id.len(), 12);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn distinct_clone_sites_never_collapse() {
        let mut alloc = IdAllocator::new();
        let a = alloc.id_for(IdKey::CloneSite { site: 1 });
        let b = alloc.id_for(IdKey::CloneSite { site: 2 });
        assert_ne!(a, b);
    }

    #[test]
    fn probing_resolves_forced_collisions() {
        // Force a collision by pre-occupying the seed slot, then make
        // sure a structurally distinct key still gets served.
        let mut alloc = IdAllocator::new();
        let key_a = IdKey::Variable { scope: 1, name: "a".into() };
        let key_b = IdKey::Variable { scope: 1, name: "b".into() };
        let slot = seed(&key_a);
        alloc.by_slot.insert(slot, key_a.clone());
        alloc.by_key.insert(key_a.clone(), encode(slot));
        // key_b may or may not collide on the same seed; either way it
        // must resolve to an id distinct from key_a's.
        let id_b = alloc.id_for(key_b);
        assert_ne!(id_b, encode(slot));
    }
}
