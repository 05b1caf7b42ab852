use std::fmt::{Display, Formatter};

use async_trait::async_trait;
#[cfg(feature = "colored")]
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::{
    chunks::RIFF,
    core::{
        deserialize_container_header, serialize_container, DeserializerRegistry, Element,
        ElementContainer, ElementDeserializer, ElementDeserializerOutput, ElementSerializerOutput,
        SharedElementDeserializer,
    },
    error::{RiffError, RiffResult},
    fourcc::FourCC,
    io::ReadAccessor,
    log,
    options::CodecOptions,
};

/// The top-level "RIFF" chunk: a form type followed by child chunks.
#[derive(Debug, Clone)]
pub struct FormElement {
    form_type: FourCC,
    children: Vec<Element>,
}

impl FormElement {
    pub fn new(form_type: FourCC) -> Self {
        FormElement {
            form_type,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> FourCC {
        RIFF
    }

    pub fn form_type(&self) -> FourCC {
        self.form_type
    }

    pub fn set_form_type(&mut self, form_type: FourCC) {
        self.form_type = form_type;
    }

    pub fn serialize(
        &self,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementSerializerOutput> {
        serialize_container(
            RIFF,
            self.form_type,
            &self.children,
            "Form",
            options,
            cancel,
        )
    }
}

impl ElementContainer for FormElement {
    fn child_elements(&self) -> &[Element] {
        &self.children
    }

    fn child_elements_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }
}

#[cfg(feature = "colored")]
impl Display for FormElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({} children)",
            "Form:".white().bold(),
            self.form_type.to_string().white().underline(),
            self.children.len()
        )
    }
}

#[cfg(not(feature = "colored"))]
impl Display for FormElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Form: {} ({} children)",
            self.form_type,
            self.children.len()
        )
    }
}

/// Decodes a "RIFF" chunk with one specific form type.
///
/// Children are resolved through the deserializer's own registry, anything unclaimed becomes a
/// [`RawElement`](crate::chunks::RawElement).
#[derive(Debug, Clone)]
pub struct FormElementDeserializer {
    form_type: FourCC,
    registry: DeserializerRegistry,
}

impl FormElementDeserializer {
    pub fn new(form_type: FourCC) -> Self {
        FormElementDeserializer {
            form_type,
            registry: DeserializerRegistry::new(),
        }
    }

    pub fn acceptable_form_type(&self) -> FourCC {
        self.form_type
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

    /// Decodes a form and returns it without the [`Element`] wrapper.
    pub async fn deserialize_form(
        &self,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<(FormElement, u64)> {
        let (chunk, next_offset) = deserialize_container_header(
            RIFF,
            self.form_type,
            "Form",
            accessor,
            start,
            end,
            options,
            cancel,
        )
        .await?;

        let body = chunk.data_accessor();
        let body_length = chunk.data_length() as u64;
        let mut form = FormElement::new(self.form_type);

        let mut offset = 4;
        while offset < body_length {
            if offset + 8 > body_length {
                return Err(RiffError::DeserializeError("Form body truncated.".into()));
            }
            let name = FourCC::from_slice(&body.read(offset, 4, cancel).await?)?;
            let output = self
                .registry
                .resolve(
                    name,
                    body.as_ref(),
                    offset,
                    Some(body_length),
                    options,
                    cancel,
                )
                .await?;
            form.add_child(output.element);
            offset = output.next_offset;
        }

        log!(
            log::Level::Debug,
            "Decoded form {} with {} children",
            self.form_type,
            form.child_count()
        );
        Ok((form, next_offset))
    }
}

#[async_trait]
impl ElementDeserializer for FormElementDeserializer {
    fn acceptable_name(&self) -> FourCC {
        RIFF
    }

    async fn deserialize(
        &self,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementDeserializerOutput> {
        let (form, next_offset) = self
            .deserialize_form(accessor, start, end, options, cancel)
            .await?;
        Ok(ElementDeserializerOutput {
            element: Element::Form(form),
            next_offset,
        })
    }
}
