//! cendre-core — conteneur de bytecode pour la VM Cendre (no_std-ready)
//!
//! Fournit :
//! - `GrowArray<T>` : tampon générique à croissance amortie (capacité 8, doublée)
//! - `Value` : constante numérique opaque à taille fixe
//! - `Chunk`, `ConstPool`, `LineTable`, `OpCode` (module [`bytecode`])
//! - Désassembleur textuel ([`bytecode::disasm`]) + validation ([`bytecode::helpers`])
//! - Erreurs `ChunkError` + alias `ChunkResult<T>`
//!
//! Features :
//! - `std` (par défaut) : impl `std::error::Error` & tests
//! - `serde` : derive (dé)sérialisation sur les petits types partagés

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/* ─────────────────────────── Imports ─────────────────────────── */

use core::fmt;

#[cfg(feature = "std")]
use std::{borrow::Cow, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Primitives de bytecode (chunk, pool de constantes, désassembleur, helpers).
pub mod bytecode;

/// Ré-exporte les helpers de validation structurelle.
pub use bytecode::helpers as helpers;
/// Ré-exporte le désassembleur textuel.
pub use bytecode::disasm as disasm;

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au crate.
pub type ChunkResult<T> = core::result::Result<T, ChunkError>;

/* ─────────────────────────── Value ─────────────────────────── */

/// Opaque fixed-size constant value.
///
/// The chunk stores and hands these back by copy; what the VM does with them
/// is its own business. No heap-allocated payloads live here.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Value(pub f64);

impl Value {
    /// Wrap a raw number.
    pub const fn new(raw: f64) -> Self { Value(raw) }
    /// Unwrap to the raw number.
    pub const fn raw(self) -> f64 { self.0 }
}

impl From<f64> for Value {
    fn from(raw: f64) -> Self { Value(raw) }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/* ─────────────────────────── GrowArray ─────────────────────────── */

/// Capacité logique d'un [`GrowArray`] fraîchement créé.
pub const INITIAL_CAPACITY: usize = 8;

/// Append-only array with an explicit amortized-doubling policy.
///
/// The logical capacity starts at [`INITIAL_CAPACITY`] and doubles whenever a
/// push would overflow it, *before* the new item is written. Backing storage
/// is only requested lazily, so `new` itself never allocates and growth
/// failures surface as [`ChunkError::ResourceExhausted`] instead of aborting.
#[derive(Debug, Clone)]
pub struct GrowArray<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> GrowArray<T> {
    /// Create an empty array (logical capacity 8, no allocation yet).
    pub const fn new() -> Self { Self { items: Vec::new(), capacity: INITIAL_CAPACITY } }

    /// Number of stored items.
    pub fn len(&self) -> usize { self.items.len() }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Current logical capacity. Always a power-of-two multiple of 8 and
    /// always `>= len`.
    pub const fn capacity(&self) -> usize { self.capacity }

    /// Lookup by index.
    pub fn get(&self, index: usize) -> Option<&T> { self.items.get(index) }

    /// Read-only view of the stored items.
    pub fn as_slice(&self) -> &[T] { &self.items }

    /// Append one item, growing the backing storage first if the logical
    /// capacity is full. Returns the index the item was stored at.
    pub fn push(&mut self, item: T) -> ChunkResult<usize> {
        let needed = if self.items.len() == self.capacity {
            self.capacity * 2
        } else {
            self.capacity
        };
        if self.items.capacity() < needed {
            let additional = needed - self.items.len();
            self.items
                .try_reserve_exact(additional)
                .map_err(|_| ChunkError::ResourceExhausted { requested: needed })?;
        }
        self.capacity = needed;
        let index = self.items.len();
        self.items.push(item);
        Ok(index)
    }
}

impl<T> Default for GrowArray<T> {
    fn default() -> Self { Self::new() }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de construction / validation d'un chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Buffer growth failed: the allocator refused the reservation.
    ResourceExhausted {
        /// Logical capacity the buffer was trying to reach.
        requested: usize,
    },
    /// A constant index no longer fits the wide operand form.
    TooManyConstants {
        /// Index the pool would have assigned to the next constant.
        index: u32,
    },
    /// Données corrompues (flux d'instructions / table des lignes).
    Corrupted(Cow<'static, str>),
}

impl ChunkError {
    /// Construit une erreur « corrompu ».
    pub fn corrupted(msg: impl Into<Cow<'static, str>>) -> Self { ChunkError::Corrupted(msg.into()) }
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::ResourceExhausted { requested } => {
                write!(f, "buffer growth failed: cannot reserve {requested} slots")
            }
            ChunkError::TooManyConstants { index } => {
                write!(f, "constant index {index} does not fit the wide operand form")
            }
            ChunkError::Corrupted(msg) => write!(f, "corrupted chunk: {msg}"),
        }
    }
}

/// Implémente `std::error::Error` uniquement avec la feature `std`.
#[cfg(feature = "std")]
impl std::error::Error for ChunkError {}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        bytecode::{Chunk, ConstPool, LineTable, OpCode},
        ChunkError, ChunkResult, GrowArray, Value, INITIAL_CAPACITY,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */
