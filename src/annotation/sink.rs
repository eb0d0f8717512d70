use super::{Annotation, AnnotationError, AnnotationSink};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Keeps the current set of annotations in memory, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSink {
    annotations: BTreeMap<String, Annotation>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.annotations.get(name)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotations in name order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }
}

impl AnnotationSink for RecordingSink {
    fn draw(&mut self, annotation: Annotation) -> Result<(), AnnotationError> {
        self.annotations
            .insert(annotation.name().to_string(), annotation);
        Ok(())
    }

    fn remove_with_prefix(&mut self, prefix: &str) -> Result<(), AnnotationError> {
        self.annotations.retain(|name, _| !name.starts_with(prefix));
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command<'a> {
    Draw { annotation: &'a Annotation },
    Remove { prefix: &'a str },
}

/// Streams draw and remove commands as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn flush(&mut self) -> Result<(), AnnotationError> {
        self.writer.flush()?;
        Ok(())
    }

    fn emit(&mut self, command: &Command<'_>) -> Result<(), AnnotationError> {
        serde_json::to_writer(&mut self.writer, command)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> AnnotationSink for JsonLinesSink<W> {
    fn draw(&mut self, annotation: Annotation) -> Result<(), AnnotationError> {
        self.emit(&Command::Draw {
            annotation: &annotation,
        })
    }

    fn remove_with_prefix(&mut self, prefix: &str) -> Result<(), AnnotationError> {
        self.emit(&Command::Remove { prefix })?;
        self.writer.flush()?;
        Ok(())
    }
}
