use std::fmt::{Display, Formatter};

use async_trait::async_trait;
#[cfg(feature = "colored")]
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::{
    chunks::LIST,
    core::{
        deserialize_container_header, serialize_container, DeserializerRegistry, Element,
        ElementContainer, ElementDeserializer, ElementDeserializerOutput, ElementSerializerOutput,
        SharedElementDeserializer,
    },
    error::RiffResult,
    fourcc::FourCC,
    io::ReadAccessor,
    iter::ElementDeserializationStream,
    log,
    options::CodecOptions,
};

/// A "LIST" chunk - a list type followed by child chunks. Lists nest inside forms and other lists.
#[derive(Debug, Clone)]
pub struct ListElement {
    list_type: FourCC,
    children: Vec<Element>,
}

impl ListElement {
    pub fn new(list_type: FourCC) -> Self {
        ListElement {
            list_type,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> FourCC {
        LIST
    }

    pub fn list_type(&self) -> FourCC {
        self.list_type
    }

    pub fn set_list_type(&mut self, list_type: FourCC) {
        self.list_type = list_type;
    }

    pub fn serialize(
        &self,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementSerializerOutput> {
        serialize_container(
            LIST,
            self.list_type,
            &self.children,
            "List",
            options,
            cancel,
        )
    }
}

impl ElementContainer for ListElement {
    fn child_elements(&self) -> &[Element] {
        &self.children
    }

    fn child_elements_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }
}

#[cfg(feature = "colored")]
impl Display for ListElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({} children)",
            "List:".white().bold(),
            self.list_type.to_string().white().underline(),
            self.children.len()
        )
    }
}

#[cfg(not(feature = "colored"))]
impl Display for ListElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "List: {} ({} children)",
            self.list_type,
            self.children.len()
        )
    }
}

/// Decodes a "LIST" chunk with one specific list type.
///
/// The children are walked with an [`ElementDeserializationStream`] bounded by the list body and
/// sharing this deserializer's registrations.
#[derive(Debug, Clone)]
pub struct ListElementDeserializer {
    list_type: FourCC,
    registry: DeserializerRegistry,
}

impl ListElementDeserializer {
    pub fn new(list_type: FourCC) -> Self {
        ListElementDeserializer {
            list_type,
            registry: DeserializerRegistry::new(),
        }
    }

    pub fn acceptable_list_type(&self) -> FourCC {
        self.list_type
    }

    pub fn use_child_deserializer(
        &mut self,
        deserializer: SharedElementDeserializer,
    ) -> RiffResult<()> {
        self.registry.use_deserializer(deserializer)
    }

    pub fn unuse_child_deserializer(
        &mut self,
        deserializer: &SharedElementDeserializer,
    ) -> RiffResult<()> {
        self.registry.unuse_deserializer(deserializer)
    }

    pub fn registry(&self) -> &DeserializerRegistry {
        &self.registry
    }
}

#[async_trait]
impl ElementDeserializer for ListElementDeserializer {
    fn acceptable_name(&self) -> FourCC {
        LIST
    }

    async fn deserialize(
        &self,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementDeserializerOutput> {
        let (chunk, next_offset) = deserialize_container_header(
            LIST,
            self.list_type,
            "List",
            accessor,
            start,
            end,
            options,
            cancel,
        )
        .await?;

        let mut stream = ElementDeserializationStream::with_registry(
            chunk.data_accessor().sub(4),
            Some(chunk.data_length() as u64 - 4),
            *options,
            self.registry.clone(),
        );
        let mut list = ListElement::new(self.list_type);
        while stream.has_next() {
            list.add_child(stream.next(cancel).await?);
        }

        log!(
            log::Level::Debug,
            "Decoded list {} with {} children",
            self.list_type,
            list.child_count()
        );
        Ok(ElementDeserializerOutput {
            element: Element::List(list),
            next_offset,
        })
    }
}

#[cfg(test)]
mod list_tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        chunks::{RawElement, ZStringElement, ZStringElementDeserializer, INFO},
        error::RiffError,
        io::MemoryReadAccessor,
    };

    const INAM: FourCC = FourCC::new(*b"INAM");
    const IART: FourCC = FourCC::new(*b"IART");

    fn info_list() -> ListElement {
        let mut list = ListElement::new(INFO);
        list.add_child(
            ZStringElement::with_string_bytes(INAM, b"Title")
                .unwrap()
                .into(),
        );
        list.add_child(
            ZStringElement::with_string_bytes(IART, b"Artist")
                .unwrap()
                .into(),
        );
        list
    }

    #[tokio::test]
    async fn info_layout() {
        let cancel = CancellationToken::new();
        let bytes = info_list()
            .serialize(&CodecOptions::GENERIC, &cancel)
            .unwrap()
            .to_bytes(&cancel)
            .await
            .unwrap();
        assert_eq!(
            bytes,
            b"LIST\x22\x00\x00\x00INFOINAM\x06\x00\x00\x00Title\x00IART\x07\x00\x00\x00Artist\x00\x00"
        );
    }

    #[tokio::test]
    async fn decodes_registered_and_fallback_children() {
        let cancel = CancellationToken::new();
        let bytes = info_list()
            .serialize(&CodecOptions::GENERIC, &cancel)
            .unwrap()
            .to_bytes(&cancel)
            .await
            .unwrap();

        let mut deserializer = ListElementDeserializer::new(INFO);
        deserializer
            .use_child_deserializer(Arc::new(ZStringElementDeserializer::new(INAM)))
            .unwrap();
        let out = deserializer
            .deserialize(
                &MemoryReadAccessor::new(bytes),
                0,
                None,
                &CodecOptions::GENERIC,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(out.next_offset, 42);

        let list = out.element.as_list().unwrap();
        assert_eq!(list.list_type(), INFO);
        assert_eq!(
            list.get_child_at(0)
                .unwrap()
                .as_zstring()
                .unwrap()
                .to_string_lossy(),
            "Title"
        );
        let artist = list.get_child_at(1).unwrap().as_raw().unwrap();
        assert_eq!(artist.name(), IART);
        assert_eq!(artist.data(&cancel).await.unwrap(), b"Artist\0");
    }

    #[tokio::test]
    async fn wrong_list_type_declines() {
        let acc = MemoryReadAccessor::new(b"LIST\x04\x00\x00\x00adtl".to_vec());
        let err = ListElementDeserializer::new(INFO)
            .deserialize(&acc, 0, None, &CodecOptions::GENERIC, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RiffError::DeserializeError(msg) if msg == "Invalid list type."));

        let acc = MemoryReadAccessor::new(b"LIST\x03\x00\x00\x00INF\x00".to_vec());
        let err = ListElementDeserializer::new(INFO)
            .deserialize(&acc, 0, None, &CodecOptions::GENERIC, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RiffError::DeserializeError(msg) if msg == "List type truncated."));
    }

    #[tokio::test]
    async fn truncated_child_header() {
        // 2 stray bytes after the list type
        let acc = MemoryReadAccessor::new(b"LIST\x06\x00\x00\x00INFOab".to_vec());
        let err = ListElementDeserializer::new(INFO)
            .deserialize(&acc, 0, None, &CodecOptions::GENERIC, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RiffError::DeserializeError(msg) if msg == "Chunk truncated."));
    }

    #[test]
    fn oversized_body_is_serialize_error() {
        let mut raw = RawElement::new(FourCC::new(*b"big "));
        raw.set_data_length(u32::MAX as u64).unwrap();
        let mut list = ListElement::new(INFO);
        list.add_child(raw.into());
        let err = list
            .serialize(&CodecOptions::MIDI, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, RiffError::SerializeError(msg) if msg == "List data is too long."));
    }

    #[tokio::test]
    async fn nested_lists_round_trip() {
        let cancel = CancellationToken::new();
        let mut outer = ListElement::new(FourCC::new(*b"outr"));
        outer.add_child(info_list().into());
        outer.add_child(RawElement::from_bytes(INAM, vec![7; 3]).unwrap().into());

        let output = outer.serialize(&CodecOptions::MIDI, &cancel).unwrap();
        let mut inner = ListElementDeserializer::new(INFO);
        inner
            .use_child_deserializer(Arc::new(ZStringElementDeserializer::new(IART)))
            .unwrap();
        let mut deserializer = ListElementDeserializer::new(FourCC::new(*b"outr"));
        deserializer.use_child_deserializer(Arc::new(inner)).unwrap();

        let decoded = deserializer
            .deserialize(
                output.accessor().as_ref(),
                0,
                Some(output.length()),
                &CodecOptions::MIDI,
                &cancel,
            )
            .await
            .unwrap();
        let outer = decoded.element.as_list().unwrap();
        assert_eq!(outer.child_count(), 2);
        let info = outer.get_child_at(0).unwrap().as_list().unwrap();
        assert!(info.get_child_at(0).unwrap().as_raw().is_some());
        assert_eq!(
            info.get_child_at(1).unwrap().as_zstring().unwrap().string_bytes(),
            b"Artist"
        );
        let raw = outer.get_child_at(1).unwrap().as_raw().unwrap();
        assert_eq!(raw.data(&cancel).await.unwrap(), vec![7; 3]);
    }
}
