/// Field visitor - the operations available to `Record::describe_fields`.
///
/// Each operation handles all four passes:
///
/// | Operation | Simulate / Emit | Load | Resolve |
/// |---|---|---|---|
/// | `data`, `bytes` | raw bytes | raw bytes | - |
/// | `dynamic_buffer`, `string` | count + bytes | count + bytes | - |
/// | `dynamic_array` | count + elements | count + elements | - |
/// | `embedded`, `embedded_array` | inline fields | inline fields | inline fields |
/// | `owned_pointer*` | type tag, child queued | type tag, child constructed | - |
/// | `reference*` | identity | identity deferred | identity substituted |

use std::mem::size_of;
use std::sync::Arc;
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::record::{Record, RecordRef, RecordWeak, record_key, lock_record};
use crate::registry::TypeTag;
use super::serializer::{Serializer, Pass, PendingReference, DeferredReference};
use super::stream::{Identity, NULL_IDENTITY};

impl<'a> Serializer<'a> {
    // ===== RAW DATA =====

    /// Copy a plain-old-data value in place
    pub fn data<T: Pod>(&mut self, value: &mut T) -> Result<()> {
        self.bytes(bytemuck::bytes_of_mut(value))
    }

    /// Copy a fixed-size byte slice in place
    pub fn bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => self.put(bytes),
            Pass::Load => {
                let src = self.take(bytes.len())?;
                bytes.copy_from_slice(src);
            }
            Pass::Resolve => {}
        }
        Ok(())
    }

    // ===== DYNAMIC BUFFERS =====

    /// Variably sized raw buffer, prefixed by its byte count
    pub fn dynamic_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => {
                let count = self.count_of(buffer.len())?;
                self.put_u32(count);
                self.put(buffer.as_slice());
            }
            Pass::Load => {
                let count = self.take_u32()? as usize;
                let src = self.take(count)?;
                buffer.clear();
                buffer.extend_from_slice(src);
            }
            Pass::Resolve => {}
        }
        Ok(())
    }

    /// UTF-8 string, stored like a dynamic buffer
    pub fn string(&mut self, value: &mut String) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => {
                let count = self.count_of(value.len())?;
                self.put_u32(count);
                self.put(value.as_bytes());
            }
            Pass::Load => {
                let count = self.take_u32()? as usize;
                let offset = self.cursor;
                let src = self.take(count)?;
                let text = std::str::from_utf8(src).map_err(|_| {
                    Error::InvalidStream(format!("invalid UTF-8 string at offset {}", offset))
                })?;
                value.clear();
                value.push_str(text);
            }
            Pass::Resolve => {}
        }
        Ok(())
    }

    /// Growable array of plain-old-data elements, prefixed by its element count
    pub fn dynamic_array<T: Pod>(&mut self, items: &mut Vec<T>) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => {
                let count = self.array_count_of(items.len())?;
                self.put_u32(count);
                if size_of::<T>() > 0 {
                    self.put(bytemuck::cast_slice(items.as_slice()));
                }
            }
            Pass::Load => {
                let count = self.take_array_count()?;
                let len = count.checked_mul(size_of::<T>()).ok_or(Error::TruncatedStream {
                    offset: self.cursor,
                    requested: usize::MAX,
                    available: self.input.len().saturating_sub(self.cursor),
                })?;
                let src = self.take(len)?;
                items.clear();
                items.resize(count, T::zeroed());
                if len > 0 {
                    bytemuck::cast_slice_mut::<T, u8>(items.as_mut_slice()).copy_from_slice(src);
                }
            }
            Pass::Resolve => {}
        }
        Ok(())
    }

    // ===== EMBEDDED SUB-RECORDS =====

    /// Sub-record stored inline in its parent (no header, no identity)
    pub fn embedded<R: Record + ?Sized>(&mut self, record: &mut R) -> Result<()> {
        record.describe_fields(self)
    }

    /// Count-prefixed array of inline sub-records
    pub fn embedded_array<R: Record + Default>(&mut self, items: &mut Vec<R>) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => {
                let count = self.array_count_of(items.len())?;
                self.put_u32(count);
                for item in items.iter_mut() {
                    item.describe_fields(self)?;
                }
            }
            Pass::Load => {
                let count = self.take_array_count()?;
                items.clear();
                for _ in 0..count {
                    let mut item = R::default();
                    item.describe_fields(self)?;
                    items.push(item);
                }
            }
            Pass::Resolve => {
                for item in items.iter_mut() {
                    item.describe_fields(self)?;
                }
            }
        }
        Ok(())
    }

    // ===== OWNED POINTERS =====

    /// Exclusively owned, polymorphic child record
    ///
    /// Save queues the child; load constructs a blank instance of the stored
    /// concrete type and queues it. The child's own header and fields follow
    /// the parent's field data in the stream.
    pub fn owned_pointer(&mut self, slot: &mut Option<RecordRef>) -> Result<()> {
        self.owned_pointer_checked(slot, None)
    }

    /// Like `owned_pointer`, rejecting a child that is not a kind of `base`
    pub fn owned_pointer_of_kind(&mut self, slot: &mut Option<RecordRef>, base: TypeTag) -> Result<()> {
        self.owned_pointer_checked(slot, Some(base))
    }

    /// Count-prefixed array of owned child records
    pub fn owned_pointer_array(&mut self, items: &mut Vec<RecordRef>) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => {
                let count = self.array_count_of(items.len())?;
                self.put_u32(count);
                for child in items.iter() {
                    let tag = self.claim_child(child, None)?;
                    self.put_u32(tag.0);
                }
            }
            Pass::Load => {
                let count = self.take_array_count()?;
                let tags = self.take_words(count)?;
                items.clear();
                for tag in tags {
                    if tag == TypeTag::NULL.0 {
                        return Err(Error::InvalidStream("null entry in owned pointer array".to_string()));
                    }
                    items.push(self.construct_child(TypeTag(tag), None)?);
                }
            }
            Pass::Resolve => {}
        }
        Ok(())
    }

    fn owned_pointer_checked(&mut self, slot: &mut Option<RecordRef>, base: Option<TypeTag>) -> Result<()> {
        match self.pass {
            Pass::Simulate | Pass::Emit => match slot {
                Some(child) => {
                    let tag = self.claim_child(child, base)?;
                    self.put_u32(tag.0);
                }
                None => self.put_u32(TypeTag::NULL.0),
            },
            Pass::Load => {
                let tag = TypeTag(self.take_u32()?);
                *slot = if tag == TypeTag::NULL {
                    None
                } else {
                    Some(self.construct_child(tag, base)?)
                };
            }
            Pass::Resolve => {}
        }
        Ok(())
    }

    /// Save: validate an owned child and queue it behind the current record
    fn claim_child(&mut self, child: &RecordRef, base: Option<TypeTag>) -> Result<TypeTag> {
        if self.table.record(self.current).is_some_and(|current| Arc::ptr_eq(current, child)) {
            return Err(Error::InvalidGraph(format!("record {} owns itself", self.current)));
        }
        if let Some(&identity) = self.owners.get(&record_key(Arc::as_ptr(child))) {
            return Err(Error::DuplicateOwnership { identity });
        }
        let tag = lock_record(child)?.type_tag();
        self.check_kind(tag, base)?;
        self.children.push(child.clone());
        Ok(tag)
    }

    /// Load: construct a blank child and queue it behind the current record
    fn construct_child(&mut self, tag: TypeTag, base: Option<TypeTag>) -> Result<RecordRef> {
        self.check_kind(tag, base)?;
        let child = self.registry.construct(tag)?;
        self.children.push(child.clone());
        Ok(child)
    }

    fn check_kind(&self, tag: TypeTag, base: Option<TypeTag>) -> Result<()> {
        if !self.registry.contains(tag) {
            return Err(Error::UnknownType(tag));
        }
        match base {
            Some(base) if !self.registry.is_kind_of(tag, base) => {
                Err(Error::TypeMismatch { expected: base, found: tag })
            }
            _ => Ok(()),
        }
    }

    // ===== REFERENCES =====

    /// Non-owning reference, resolved once every owned record is known
    pub fn reference(&mut self, slot: &mut Option<RecordWeak>) -> Result<()> {
        match self.pass {
            Pass::Simulate => {
                if let Some(target) = slot {
                    self.defer_check(target);
                }
                self.put_u32(NULL_IDENTITY);
            }
            Pass::Emit => {
                let identity = match slot {
                    Some(target) => self.simulated_identity(target)?,
                    None => NULL_IDENTITY,
                };
                self.put_u32(identity);
            }
            Pass::Load => {
                let identity = self.take_u32()?;
                self.deferred.push_back(DeferredReference::Single(identity));
            }
            Pass::Resolve => match self.deferred.pop_front() {
                Some(DeferredReference::Single(NULL_IDENTITY)) => *slot = None,
                Some(DeferredReference::Single(identity)) => *slot = Some(self.resolve(identity)?),
                _ => return Err(Self::resolve_order_error()),
            },
        }
        Ok(())
    }

    /// Count-prefixed array of non-owning references
    pub fn reference_array(&mut self, items: &mut Vec<RecordWeak>) -> Result<()> {
        match self.pass {
            Pass::Simulate => {
                let count = self.array_count_of(items.len())?;
                self.put_u32(count);
                for target in items.iter() {
                    self.defer_check(target);
                    self.put_u32(NULL_IDENTITY);
                }
            }
            Pass::Emit => {
                let count = self.array_count_of(items.len())?;
                self.put_u32(count);
                for target in items.iter() {
                    let identity = self.simulated_identity(target)?;
                    self.put_u32(identity);
                }
            }
            Pass::Load => {
                let count = self.take_array_count()?;
                let identities = self.take_words(count)?;
                self.deferred.push_back(DeferredReference::Array(identities));
            }
            Pass::Resolve => match self.deferred.pop_front() {
                Some(DeferredReference::Array(identities)) => {
                    items.clear();
                    for identity in identities {
                        items.push(self.resolve(identity)?);
                    }
                }
                _ => return Err(Self::resolve_order_error()),
            },
        }
        Ok(())
    }

    /// Simulate: remember a reference target for the dangling check
    fn defer_check(&mut self, target: &RecordWeak) {
        self.pending.push(PendingReference {
            key: record_key(target.as_ptr()),
            alive: target.strong_count() > 0,
            referrer: self.current,
        });
    }

    /// Emit: identity assigned to a reference target by the simulate run
    fn simulated_identity(&self, target: &RecordWeak) -> Result<Identity> {
        self.simulation
            .as_ref()
            .and_then(|simulation| simulation.owners.get(&record_key(target.as_ptr())))
            .copied()
            .ok_or(Error::DanglingReference { referrer: self.current })
    }

    /// Resolve: live record of a stored identity
    fn resolve(&self, identity: Identity) -> Result<RecordWeak> {
        self.table
            .record(identity)
            .map(Arc::downgrade)
            .ok_or(Error::BrokenReference { identity, table_len: self.table.len() })
    }

    fn resolve_order_error() -> Error {
        Error::InvalidStream("reference fields described in a different order than when loaded".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "visitor_tests.rs"]
mod tests;
