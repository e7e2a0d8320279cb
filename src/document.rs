use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;
use crate::pdf::PdfDocument;

/// The weight a piece of text is set in. Which concrete face realizes each
/// weight is decided by the PDF backend, the document model only records the
/// intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Which side of a piece of text sits on its anchor position. Centered and
/// right-aligned text is measured with the font metrics at rendering time, so
/// the document model can anchor a column by its right edge without knowing
/// how wide its values will be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
}

/// A single drawing instruction. All positions and sizes are expressed in
/// millimeters from the top left corner of the current page, and the vertical
/// coordinate of a text operation addresses its baseline. Operations draw onto
/// the page opened by the most recent `AppendNewPage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// Open a new page of the given size in millimeters and direct all
    /// following operations onto it.
    AppendNewPage { page_width: f64, page_height: f64 },
    /// Write a single run of text. The color components are in the zero to one range.
    UnicodeText {
        color: [f64; 3],
        position: [f64; 2],
        text_string: String,
        font_size: f64,
        font_weight: FontWeight,
        alignment: TextAlignment,
    },
    /// Place the image found at the given path, scaled to the given size.
    Image {
        image_path: PathBuf,
        position: [f64; 2],
        size: [f64; 2],
    },
    /// Fill an axis-aligned rectangle with the given color.
    FilledRectangle {
        color: [f64; 3],
        position: [f64; 2],
        size: [f64; 2],
    },
    /// Stroke a straight line between the two given positions.
    Line {
        color: [f64; 3],
        from: [f64; 2],
        to: [f64; 2],
    },
}

/// The declarative description of a document: an identifier naming what it is,
/// an instance identifier telling this rendering apart in the PDF `ID` tag,
/// and the flat list of operations which paint it. The struct is plain data,
/// it can be built from code, inspected in tests or round-tripped through JSON
/// before ever touching the PDF backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub instance_id: String,
    pub operations: Vec<Operation>,
}

impl Document {
    /// Reads a document from the JSON file at the given path.
    pub fn from_json_file(document_path: &Path) -> Result<Document, ContextError> {
        let document_content = std::fs::read(document_path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the JSON document {:?}", document_path),
                &error,
            )
        })?;
        let document: Document = serde_json::from_slice(&document_content).map_err(|error| {
            ContextError::with_error(
                format!("Failed to parse the JSON document {:?}", document_path),
                &error,
            )
        })?;

        Ok(document)
    }

    /// Writes the document to the given path as indented JSON, the same shape
    /// `from_json_file` reads back.
    pub fn save_to_json_file(&self, document_path: &Path) -> Result<(), ContextError> {
        let mut content_buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut content_buffer, formatter);
        self.serialize(&mut serializer).map_err(|error| {
            ContextError::with_error(
                format!("Failed to serialize the document {:?}", self.document_id),
                &error,
            )
        })?;

        let mut document_file = std::fs::File::create(document_path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to create the JSON document {:?}", document_path),
                &error,
            )
        })?;
        document_file.write_all(&content_buffer).map_err(|error| {
            ContextError::with_error(
                format!("Failed to write the JSON document {:?}", document_path),
                &error,
            )
        })?;

        Ok(())
    }

    /// Replays the operations of the document onto a fresh `PdfDocument` in a single pass.
    /// Every drawing operation lands on the page opened by the most recent `AppendNewPage`,
    /// and a drawing operation appearing before any page has been opened is an error.
    pub fn to_pdf_document(&self) -> Result<PdfDocument, ContextError> {
        let mut pdf_document = PdfDocument::new(self.document_id.clone());
        let mut current_page_and_layer: Option<(usize, usize)> = None;

        for operation in &self.operations {
            match operation {
                Operation::AppendNewPage {
                    page_width,
                    page_height,
                } => {
                    current_page_and_layer =
                        Some(pdf_document.add_page_with_layer(*page_width, *page_height));
                }
                Operation::UnicodeText {
                    color,
                    position,
                    text_string,
                    font_size,
                    font_weight,
                    alignment,
                } => {
                    let (page_index, layer_index) = drawing_target(current_page_and_layer)?;
                    pdf_document.write_text_to_layer_in_page(
                        page_index,
                        layer_index,
                        *color,
                        text_string.clone(),
                        *font_weight,
                        *font_size,
                        *alignment,
                        *position,
                    )?;
                }
                Operation::Image {
                    image_path,
                    position,
                    size,
                } => {
                    let (page_index, layer_index) = drawing_target(current_page_and_layer)?;
                    pdf_document.place_image_in_page(
                        page_index,
                        layer_index,
                        image_path,
                        *position,
                        *size,
                    )?;
                }
                Operation::FilledRectangle {
                    color,
                    position,
                    size,
                } => {
                    let (page_index, layer_index) = drawing_target(current_page_and_layer)?;
                    pdf_document.draw_filled_rectangle_in_page(
                        page_index,
                        layer_index,
                        *color,
                        *position,
                        *size,
                    )?;
                }
                Operation::Line { color, from, to } => {
                    let (page_index, layer_index) = drawing_target(current_page_and_layer)?;
                    pdf_document.draw_line_in_page(page_index, layer_index, *color, *from, *to)?;
                }
            }
        }

        Ok(pdf_document)
    }

    /// Renders the document and serializes the finished PDF to bytes. Rendering the same
    /// document twice produces the same bytes, which the tests rely on.
    pub fn save_to_pdf_bytes(&self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document = self.to_pdf_document()?;
        pdf_document.write_all(self.instance_id.clone())?;
        pdf_document.optimize();
        pdf_document.save_to_bytes()
    }

    /// Renders the document and writes the finished PDF to the given path.
    pub fn save_to_pdf_file(&self, pdf_file_path: &Path) -> Result<(), ContextError> {
        let pdf_document_bytes = self.save_to_pdf_bytes()?;
        std::fs::write(pdf_file_path, pdf_document_bytes).map_err(|error| {
            ContextError::with_error(
                format!("Failed to save the PDF document {:?}", pdf_file_path),
                &error,
            )
        })?;

        Ok(())
    }
}

/// The page and layer a drawing operation lands on, or an error when no page
/// has been opened yet.
fn drawing_target(
    current_page_and_layer: Option<(usize, usize)>,
) -> Result<(usize, usize), ContextError> {
    current_page_and_layer.ok_or(ContextError::with_context(
        "Failed to replay a drawing operation because no page has been appended yet",
    ))
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn letter_page() -> Operation {
        Operation::AppendNewPage {
            page_width: 216.04,
            page_height: 279.39,
        }
    }

    #[test]
    fn a_drawing_operation_before_any_page_is_rejected() {
        let document = Document {
            document_id: "orphan-text".to_string(),
            instance_id: "0".to_string(),
            operations: vec![Operation::UnicodeText {
                color: [0.0, 0.0, 0.0],
                position: [10.0, 10.0],
                text_string: "floating".to_string(),
                font_size: 12.0,
                font_weight: FontWeight::Regular,
                alignment: TextAlignment::Left,
            }],
        };

        let error = document.to_pdf_document().err().unwrap();
        assert!(error.context.contains("no page has been appended"));
    }

    #[test]
    fn operations_round_trip_through_json() {
        let document = Document {
            document_id: "round-trip".to_string(),
            instance_id: "20240311".to_string(),
            operations: vec![
                letter_page(),
                Operation::FilledRectangle {
                    color: [0.9, 0.9, 0.9],
                    position: [10.5, 93.75],
                    size: [195.0, 7.6],
                },
                Operation::Line {
                    color: [0.37, 0.37, 0.37],
                    from: [124.5, 93.85],
                    to: [124.5, 101.25],
                },
                Operation::UnicodeText {
                    color: [0.25, 0.25, 0.25],
                    position: [204.0, 14.0],
                    text_string: "INVOICE".to_string(),
                    font_size: 29.0,
                    font_weight: FontWeight::Bold,
                    alignment: TextAlignment::Right,
                },
                Operation::Image {
                    image_path: PathBuf::from("images/main_logo.png"),
                    position: [12.8, 5.0],
                    size: [30.0, 30.0],
                },
            ],
        };

        let serialized = serde_json::to_string_pretty(&document).unwrap();
        let deserialized: Document = serde_json::from_str(&serialized).unwrap();
        assert_eq!(document, deserialized);
    }

    #[test]
    fn a_saved_json_document_loads_back_identical() {
        let document_directory = tempfile::tempdir().unwrap();
        let document_path = document_directory.path().join("invoice_document.json");
        let document = Document {
            document_id: "saved-document".to_string(),
            instance_id: "20240311".to_string(),
            operations: vec![letter_page()],
        };

        document.save_to_json_file(&document_path).unwrap();
        let written_content = std::fs::read_to_string(&document_path).unwrap();
        assert!(written_content.starts_with("{\n    \"document_id\""));

        let loaded_document = Document::from_json_file(&document_path).unwrap();
        assert_eq!(document, loaded_document);
    }

    #[test]
    fn rendering_the_same_document_twice_gives_identical_bytes() {
        let document = Document {
            document_id: "determinism".to_string(),
            instance_id: "20240311".to_string(),
            operations: vec![
                letter_page(),
                Operation::UnicodeText {
                    color: [0.25, 0.25, 0.25],
                    position: [16.28, 42.0],
                    text_string: "Paperleaf Stationers".to_string(),
                    font_size: 10.0,
                    font_weight: FontWeight::Bold,
                    alignment: TextAlignment::Left,
                },
                Operation::FilledRectangle {
                    color: [0.9, 0.9, 0.9],
                    position: [112.5, 42.0],
                    size: [95.0, 8.8],
                },
                Operation::Line {
                    color: [0.37, 0.37, 0.37],
                    from: [151.5, 93.85],
                    to: [151.5, 101.25],
                },
            ],
        };

        let first_rendering = document.save_to_pdf_bytes().unwrap();
        let second_rendering = document.save_to_pdf_bytes().unwrap();
        assert_eq!(first_rendering, second_rendering);
    }

    #[test]
    fn the_rendered_bytes_declare_the_expected_pdf_version() {
        let document = Document {
            document_id: "header".to_string(),
            instance_id: "0".to_string(),
            operations: vec![letter_page()],
        };

        let pdf_document_bytes = document.save_to_pdf_bytes().unwrap();
        assert!(pdf_document_bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn reading_a_missing_json_document_reports_the_path() {
        let error = Document::from_json_file(Path::new("definitely/not/here.json")).unwrap_err();
        assert!(error.context.contains("definitely/not/here.json"));
        assert!(error.source_error.is_some());
    }
}
