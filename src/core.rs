/// Module containing the element tree, the element (de)serialization contracts and the deserializer
/// registry used to resolve child chunks.
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    chunks::{
        FormElement, ListElement, RawElement, RawElementDeserializer, ZStringElement, LIST, RIFF,
    },
    error::{RiffError, RiffResult},
    fourcc::FourCC,
    header::{Chunk, ChunkDeserializer, ChunkSerializer},
    io::{
        copy_between_accessors, ensure_not_cancelled, MemoryReadAccessor,
        MultiSegmentReadAccessorFactory, ReadAccessor, SharedReadAccessor, WriteAccessor,
        IO_BLOCK_SIZE,
    },
    log,
    options::CodecOptions,
};

/// Largest body a chunk can declare.
pub const MAX_CHUNK_LENGTH: u64 = u32::MAX as u64;

/// A decoded chunk tree node.
#[derive(Debug, Clone)]
pub enum Element {
    Form(FormElement),
    List(ListElement),
    Raw(RawElement),
    ZString(ZStringElement),
}

impl Element {
    /// The chunk id this element serializes under: "RIFF" for forms, "LIST" for lists and the
    /// element's own name otherwise.
    pub fn name(&self) -> FourCC {
        match self {
            Element::Form(_) => RIFF,
            Element::List(_) => LIST,
            Element::Raw(raw) => raw.name(),
            Element::ZString(zstr) => zstr.name(),
        }
    }

    pub fn serialize(
        &self,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementSerializerOutput> {
        match self {
            Element::Form(form) => form.serialize(options, cancel),
            Element::List(list) => list.serialize(options, cancel),
            Element::Raw(raw) => raw.serialize(options, cancel),
            Element::ZString(zstr) => zstr.serialize(options, cancel),
        }
    }

    pub fn as_form(&self) -> Option<&FormElement> {
        match self {
            Element::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_form_mut(&mut self) -> Option<&mut FormElement> {
        match self {
            Element::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListElement> {
        match self {
            Element::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListElement> {
        match self {
            Element::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawElement> {
        match self {
            Element::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_raw_mut(&mut self) -> Option<&mut RawElement> {
        match self {
            Element::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_zstring(&self) -> Option<&ZStringElement> {
        match self {
            Element::ZString(zstr) => Some(zstr),
            _ => None,
        }
    }

    pub fn as_zstring_mut(&mut self) -> Option<&mut ZStringElement> {
        match self {
            Element::ZString(zstr) => Some(zstr),
            _ => None,
        }
    }

    fn fmt_tree(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        for _ in 0..depth {
            write!(f, "\t")?;
        }
        match self {
            Element::Form(form) => {
                write!(f, "{}", form)?;
                for child in form.children() {
                    writeln!(f)?;
                    child.fmt_tree(f, depth + 1)?;
                }
            }
            Element::List(list) => {
                write!(f, "{}", list)?;
                for child in list.children() {
                    writeln!(f)?;
                    child.fmt_tree(f, depth + 1)?;
                }
            }
            Element::Raw(raw) => write!(f, "{}", raw)?,
            Element::ZString(zstr) => write!(f, "{}", zstr)?,
        }
        Ok(())
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl From<FormElement> for Element {
    fn from(form: FormElement) -> Self {
        Element::Form(form)
    }
}

impl From<ListElement> for Element {
    fn from(list: ListElement) -> Self {
        Element::List(list)
    }
}

impl From<RawElement> for Element {
    fn from(raw: RawElement) -> Self {
        Element::Raw(raw)
    }
}

impl From<ZStringElement> for Element {
    fn from(zstr: ZStringElement) -> Self {
        Element::ZString(zstr)
    }
}

/// Serialized bytes of an element: an accessor over the full chunk and its length.
#[derive(Clone)]
pub struct ElementSerializerOutput {
    accessor: SharedReadAccessor,
    length: u64,
}

impl ElementSerializerOutput {
    pub fn new(accessor: SharedReadAccessor, length: u64) -> Self {
        ElementSerializerOutput { accessor, length }
    }

    pub fn accessor(&self) -> &SharedReadAccessor {
        &self.accessor
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Copies the serialized bytes into `dst` starting at `offset`.
    pub async fn write(
        &self,
        dst: &dyn WriteAccessor,
        offset: u64,
        cancel: &CancellationToken,
    ) -> RiffResult<()> {
        let dst = dst.sub(offset);
        copy_between_accessors(
            self.accessor.as_ref(),
            dst.as_ref(),
            self.length,
            IO_BLOCK_SIZE,
            cancel,
        )
        .await
    }

    /// Reads the serialized bytes into memory.
    pub async fn to_bytes(&self, cancel: &CancellationToken) -> RiffResult<Vec<u8>> {
        self.accessor.read(0, self.length, cancel).await
    }
}

impl std::fmt::Debug for ElementSerializerOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementSerializerOutput")
            .field("length", &self.length)
            .finish()
    }
}

/// A decoded element and the offset of the sibling that follows it.
#[derive(Debug, Clone)]
pub struct ElementDeserializerOutput {
    pub element: Element,
    pub next_offset: u64,
}

/// Decodes one kind of chunk into an [`Element`].
///
/// A deserializer accepts exactly one chunk id. Returning [`RiffError::DeserializeError`] means
/// "not mine" and lets the caller try the next candidate; any other error aborts decoding.
#[async_trait]
pub trait ElementDeserializer: Send + Sync {
    fn acceptable_name(&self) -> FourCC;

    async fn deserialize(
        &self,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementDeserializerOutput>;
}

pub type SharedElementDeserializer = Arc<dyn ElementDeserializer>;

/// Child deserializers keyed by the id they accept.
///
/// Several deserializers may claim the same id; they are tried in registration order, followed by
/// a [`RawElementDeserializer`] that accepts anything.
#[derive(Clone, Default)]
pub struct DeserializerRegistry {
    entries: HashMap<u32, Vec<SharedElementDeserializer>>,
}

impl DeserializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_deserializer(&mut self, deserializer: SharedElementDeserializer) -> RiffResult<()> {
        let name = deserializer.acceptable_name();
        let entry = self.entries.entry(name.key()).or_default();
        if entry.iter().any(|d| Arc::ptr_eq(d, &deserializer)) {
            return Err(RiffError::DeserializerExists(name));
        }
        entry.push(deserializer);
        Ok(())
    }

    pub fn unuse_deserializer(&mut self, deserializer: &SharedElementDeserializer) -> RiffResult<()> {
        let name = deserializer.acceptable_name();
        let entry = self
            .entries
            .get_mut(&name.key())
            .ok_or(RiffError::DeserializerNotExists(name))?;
        let idx = entry
            .iter()
            .position(|d| Arc::ptr_eq(d, deserializer))
            .ok_or(RiffError::DeserializerNotExists(name))?;
        entry.remove(idx);
        if entry.is_empty() {
            self.entries.remove(&name.key());
        }
        Ok(())
    }

    /// Number of deserializers registered for `name`.
    pub fn count(&self, name: FourCC) -> usize {
        self.entries.get(&name.key()).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidate chain for a child id: the registered deserializers, then the raw fallback.
    pub fn chain(&self, name: FourCC) -> Vec<SharedElementDeserializer> {
        let mut chain: Vec<SharedElementDeserializer> = self
            .entries
            .get(&name.key())
            .map(|entry| entry.to_vec())
            .unwrap_or_default();
        chain.push(Arc::new(RawElementDeserializer::new(name)));
        chain
    }

    /// Decodes the child at `start`, whose id has already been peeked as `name`.
    pub async fn resolve(
        &self,
        name: FourCC,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementDeserializerOutput> {
        let mut declined = None;
        for candidate in self.chain(name) {
            match candidate
                .deserialize(accessor, start, end, options, cancel)
                .await
            {
                Ok(output) => {
                    log!(
                        log::Level::Debug,
                        "Decoded {} at {}, next at {}",
                        name,
                        start,
                        output.next_offset
                    );
                    return Ok(output);
                }
                Err(e) if e.is_deserialize() => {
                    log!(log::Level::Debug, "Deserializer for {} declined: {}", name, e);
                    declined = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(declined.unwrap_or_else(|| {
            RiffError::DeserializeError(format!("No deserializer accepted {}.", name))
        }))
    }
}

impl std::fmt::Debug for DeserializerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<FourCC> = self
            .entries
            .keys()
            .map(|key| FourCC::new(key.to_be_bytes()))
            .collect();
        names.sort();
        f.debug_struct("DeserializerRegistry")
            .field("names", &names)
            .finish()
    }
}

/// Index-checked management of an ordered list of child elements.
pub trait ElementContainer {
    fn child_elements(&self) -> &[Element];

    fn child_elements_mut(&mut self) -> &mut Vec<Element>;

    fn child_count(&self) -> usize {
        self.child_elements().len()
    }

    fn children(&self) -> std::slice::Iter<'_, Element> {
        self.child_elements().iter()
    }

    fn add_child(&mut self, element: Element) {
        self.child_elements_mut().push(element);
    }

    /// Inserts at `index`, which may equal the child count.
    fn insert_child_at(&mut self, index: usize, element: Element) -> RiffResult<()> {
        let children = self.child_elements_mut();
        if index > children.len() {
            return Err(RiffError::InvalidIndex(index));
        }
        children.insert(index, element);
        Ok(())
    }

    fn remove_child(&mut self, index: usize) -> RiffResult<Element> {
        let children = self.child_elements_mut();
        if index >= children.len() {
            return Err(RiffError::InvalidIndex(index));
        }
        Ok(children.remove(index))
    }

    fn get_child_at(&self, index: usize) -> RiffResult<&Element> {
        self.child_elements()
            .get(index)
            .ok_or(RiffError::InvalidIndex(index))
    }

    fn get_child_at_mut(&mut self, index: usize) -> RiffResult<&mut Element> {
        self.child_elements_mut()
            .get_mut(index)
            .ok_or(RiffError::InvalidIndex(index))
    }

    /// Replaces the child at `index` and returns the previous one.
    fn set_child_at(&mut self, index: usize, element: Element) -> RiffResult<Element> {
        let slot = self.get_child_at_mut(index)?;
        Ok(std::mem::replace(slot, element))
    }

    fn remove_all_children(&mut self) {
        self.child_elements_mut().clear();
    }
}

/// Serializes a form or list: `container_type` followed by every child, wrapped in a chunk named
/// `id`. `label` names the container in errors.
pub(crate) fn serialize_container(
    id: FourCC,
    container_type: FourCC,
    children: &[Element],
    label: &str,
    options: &CodecOptions,
    cancel: &CancellationToken,
) -> RiffResult<ElementSerializerOutput> {
    ensure_not_cancelled(cancel)?;

    let mut body = MultiSegmentReadAccessorFactory::new();
    body.add(
        Arc::new(MemoryReadAccessor::new(container_type.as_bytes().to_vec())),
        4,
    );
    for child in children {
        let output = child.serialize(options, cancel)?;
        body.add(Arc::clone(output.accessor()), output.length());
        if body.len() > MAX_CHUNK_LENGTH {
            return Err(RiffError::SerializeError(format!(
                "{} data is too long.",
                label
            )));
        }
    }

    let data_length = body.len() as u32;
    let chunk = Chunk::new(id, Arc::new(body.create()), data_length);
    let output = ChunkSerializer::new(*options).serialize(&chunk, cancel)?;
    log!(
        log::Level::Debug,
        "Serialized {} {} with {} children ({} bytes)",
        id,
        container_type,
        children.len(),
        output.data_length
    );
    Ok(ElementSerializerOutput::new(
        output.data_accessor,
        output.data_length,
    ))
}

/// Decodes a form/list chunk header and checks its wrapper id and container type.
///
/// Returns the chunk and the offset that follows it. The container body starts at offset 4 of the
/// chunk's data.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn deserialize_container_header(
    expected_id: FourCC,
    expected_type: FourCC,
    label: &str,
    accessor: &dyn ReadAccessor,
    start: u64,
    end: Option<u64>,
    options: &CodecOptions,
    cancel: &CancellationToken,
) -> RiffResult<(Chunk, u64)> {
    let output = ChunkDeserializer::new(*options)
        .deserialize(accessor, start, end, cancel)
        .await?;
    let chunk = output.chunk;

    if chunk.id() != expected_id {
        return Err(RiffError::DeserializeError(
            "Invalid element name (chunk ID).".into(),
        ));
    }
    if chunk.data_length() < 4 {
        return Err(RiffError::DeserializeError(format!(
            "{} type truncated.",
            label
        )));
    }

    let container_type = chunk.data_accessor().read(0, 4, cancel).await?;
    if container_type.as_slice() != expected_type.as_bytes() {
        return Err(RiffError::DeserializeError(format!(
            "Invalid {} type.",
            label.to_lowercase()
        )));
    }

    Ok((chunk, output.next_offset))
}
