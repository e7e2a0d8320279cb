use std::{collections::BTreeMap, io::BufWriter, mem, path::Path};

use lopdf::StringFormat;
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization as _;

use crate::document::{FontWeight, TextAlignment};
use crate::error::ContextError;

/// Advance widths for the printable ASCII range (0x20 to 0x7E) of the Helvetica
/// face, in thousandths of an em, transcribed from the Adobe core font metrics.
/// The fourteen core faces are guaranteed to be available in every conforming
/// PDF viewer, so carrying their metrics here lets the renderer measure text
/// without ever touching a font file on disk.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20..=0x2F
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30..=0x3F
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40..=0x4F
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50..=0x5F
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60..=0x6F
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70..=0x7E
];

/// Advance widths for the printable ASCII range of the Helvetica-Bold face.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20..=0x2F
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30..=0x3F
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40..=0x4F
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50..=0x5F
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60..=0x6F
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70..=0x7E
];

/// Advance widths for the Latin-1 supplement (0xA0 to 0xFF) of the Helvetica
/// face. WinAnsi coincides with Latin-1 over this whole range, so the tables
/// are indexed directly by the encoded byte.
const HELVETICA_LATIN1_WIDTHS: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0..=0xAF
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0..=0xBF
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0..=0xCF
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0..=0xDF
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0..=0xEF
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0..=0xFF
];

/// Advance widths for the Latin-1 supplement of the Helvetica-Bold face.
const HELVETICA_BOLD_LATIN1_WIDTHS: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0..=0xAF
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0..=0xBF
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0..=0xCF
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0..=0xDF
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0..=0xEF
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556, // 0xF0..=0xFF
];

/// One of the built-in PDF faces the renderer draws with. These are referenced
/// by name in the font dictionary and never embedded, which keeps the output
/// small and reproducible across machines without any font assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoreFont {
    Helvetica,
    HelveticaBold,
}

impl CoreFont {
    /// Select the face that realizes the given weight of the document model.
    pub fn for_weight(font_weight: FontWeight) -> CoreFont {
        match font_weight {
            FontWeight::Regular => CoreFont::Helvetica,
            FontWeight::Bold => CoreFont::HelveticaBold,
        }
    }

    /// The `BaseFont` name under which the face is registered in the PDF.
    fn base_font_name(&self) -> &'static str {
        match self {
            CoreFont::Helvetica => "Helvetica",
            CoreFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// The identifier the face is referenced by from the content streams.
    fn face_identifier(&self) -> &'static str {
        match self {
            CoreFont::Helvetica => "F0",
            CoreFont::HelveticaBold => "F1",
        }
    }

    /// Retrieve the advance width of a character in thousandths of an em, or
    /// nothing if the character falls outside the supported character set.
    pub fn advance_width(&self, character: char) -> Option<u32> {
        let (ascii_widths, latin1_widths) = match self {
            CoreFont::Helvetica => (&HELVETICA_WIDTHS, &HELVETICA_LATIN1_WIDTHS),
            CoreFont::HelveticaBold => (&HELVETICA_BOLD_WIDTHS, &HELVETICA_BOLD_LATIN1_WIDTHS),
        };
        match character {
            ' '..='~' => Some(ascii_widths[character as usize - 0x20] as u32),
            '\u{00A0}'..='\u{00FF}' => Some(latin1_widths[character as usize - 0xA0] as u32),
            '€' => Some(556),
            '\u{2018}' | '\u{2019}' => match self {
                CoreFont::Helvetica => Some(222),
                CoreFont::HelveticaBold => Some(278),
            },
            '\u{201C}' | '\u{201D}' => match self {
                CoreFont::Helvetica => Some(333),
                CoreFont::HelveticaBold => Some(500),
            },
            '\u{2013}' => Some(556),
            '\u{2014}' => Some(1000),
            '\u{2022}' => Some(350),
            _ => None,
        }
    }

    /// Measure the width in points that the given text occupies at the given
    /// font size. Characters outside the supported set contribute nothing,
    /// mirroring the fact that the writing routine skips them.
    pub fn text_width_in_points(&self, text: &str, font_size: f64) -> f64 {
        let total_width: u32 = text
            .nfc()
            .filter_map(|character| self.advance_width(character))
            .sum();
        total_width as f64 * font_size / 1000.0
    }
}

/// Encode a character into the single-byte WinAnsi encoding declared for the
/// core faces. WinAnsi is Latin-1 over 0xA0 to 0xFF plus a handful of
/// typographic characters in the 0x80 to 0x9F window. Returns nothing for
/// characters the encoding cannot represent.
fn encode_win_ansi(character: char) -> Option<u8> {
    match character {
        ' '..='~' => Some(character as u8),
        '\u{00A0}'..='\u{00FF}' => Some(character as u8),
        '€' => Some(0x80),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201C}' => Some(0x93),
        '\u{201D}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        _ => None,
    }
}

/// One layer of PDF data. It can be converted into a `lopdf::Stream` by calling `Into<lopdf::Stream>::into`.
#[derive(Debug, Clone)]
pub struct PdfLayer {
    /// Name of the layer, it is currently only used for debugging.
    #[allow(dead_code)]
    pub(crate) name: String,
    /// Stream objects in this layer. Usually, one layer equals to one stream.
    pub(super) operations: Vec<lopdf::content::Operation>,
}

impl From<PdfLayer> for lopdf::Stream {
    fn from(value: PdfLayer) -> Self {
        use lopdf::{Dictionary, Stream};
        // Construct the stream content from the actual underlying operations of the layer
        let stream_content = lopdf::content::Content {
            operations: value.operations,
        };

        // Encode the uncompressed stream content into the stream
        Stream::new(
            Dictionary::new(),
            stream_content
                .encode()
                .map_err(|error| {
                    ContextError::with_error("Failed to encode PDF layer content", &error)
                })
                .unwrap(),
        )
        .with_compression(false) // Page contents should not be compressed
    }
}

/// The low-level image representation for a PDF document: a rectangle of plain
/// RGB samples together with its dimensions in pixels.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Width of the image in pixels (the original width, not the scaled one).
    pub width_in_pixels: u32,
    /// Height of the image in pixels.
    pub height_in_pixels: u32,
    /// The raw samples, three bytes per pixel in row-major order.
    pub rgb_samples: Vec<u8>,
}

impl ImageXObject {
    /// Load an image from the given path and flatten it into RGB samples. Any
    /// format the `image` crate was compiled with is accepted, and an alpha
    /// channel is discarded if one is present.
    pub fn from_file(image_path: &Path) -> Result<ImageXObject, ContextError> {
        let dynamic_image = image::open(image_path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to open the image {:?}", image_path),
                &error,
            )
        })?;
        let rgb_image = dynamic_image.to_rgb8();

        Ok(ImageXObject {
            width_in_pixels: rgb_image.width(),
            height_in_pixels: rgb_image.height(),
            rgb_samples: rgb_image.into_raw(),
        })
    }
}

/// `XObject`s are parts of the PDF specification. They allow for complex behavior to be
/// inserted into the PDF document: this comprises bookmarks, annotations and even images.
/// This implementation is only partial as it allows only for images.
#[derive(Debug, Clone)]
pub enum XObject {
    /// The `XObject` interface for an image. It can be converted into a `lopdf::Object`.
    Image(ImageXObject),
}

impl From<XObject> for lopdf::Object {
    fn from(value: XObject) -> Self {
        use lopdf::Object::*;
        match value {
            XObject::Image(image) => {
                // Describe the samples according to the PDF specification: a
                // stream of bytes whose dictionary declares the pixel layout
                let stream_dictionary = lopdf::Dictionary::from_iter(vec![
                    ("Type", Name("XObject".into())),
                    ("Subtype", Name("Image".into())),
                    ("Width", Integer(image.width_in_pixels as i64)),
                    ("Height", Integer(image.height_in_pixels as i64)),
                    ("ColorSpace", Name("DeviceRGB".into())),
                    ("BitsPerComponent", Integer(8)),
                    ("Interpolate", Boolean(false)),
                ]);
                Stream(lopdf::Stream::new(stream_dictionary, image.rgb_samples))
            }
        }
    }
}

/// Named reference to an `XObject`.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct XObjectReference(String);

impl XObjectReference {
    /// Creates a new reference for an `XObject` from a number.
    pub fn new(index: usize) -> Self {
        Self(format!("X{index}"))
    }
}

/// The association between the `XObject` names and the actual `XObject`s themselves.
/// The map is ordered so that repeated renders insert the objects in the same
/// order, which keeps the serialized document reproducible.
#[derive(Default, Debug, Clone)]
pub struct XObjectMap(BTreeMap<String, XObject>);

impl XObjectMap {
    /// Registers an `XObject` into the map, returning the name it can be
    /// referenced by from the content stream of the layer.
    pub fn add_xobject(&mut self, xobject: XObject) -> XObjectReference {
        let xobject_reference = XObjectReference::new(self.0.len());
        self.0.insert(xobject_reference.0.clone(), xobject);

        xobject_reference
    }

    /// Inserts the `XObject`s into the document, simultaneously constructing a PDF dictionary of them.
    pub fn into_with_document(&self, inner_document: &mut lopdf::Document) -> lopdf::Dictionary {
        self.0
            .iter()
            .map(|(name, xobject)| {
                // For each `XObject` present into the map, add it to the document by first converting it into a PDF object
                let object: lopdf::Object = xobject.clone().into();
                let object_reference = inner_document.add_object(object);
                // Then collect the associated object name and reference to it into a PDF dictionary, which is returned in the end
                (name.clone(), lopdf::Object::Reference(object_reference))
            })
            .collect()
    }
}

/// Struct for storing the PDF resources to be used on a PDF page.
#[derive(Default, Debug, Clone)]
pub(crate) struct PdfResources {
    /// External graphics objects, at the moment only the placed images.
    pub xobjects: XObjectMap,
}

impl PdfResources {
    /// Inserts the resources into the document, simultaneously constructing a PDF dictionary of them.
    pub(crate) fn with_document(
        &self,
        inner_document: &mut lopdf::Document,
    ) -> lopdf::Dictionary {
        let mut dictionary = lopdf::Dictionary::new();

        // Insert the `XObjects` into the document and obtain the associated dictionary
        let xobjects_dictionary: lopdf::Dictionary =
            self.xobjects.into_with_document(inner_document);

        // If the `XObjects` dictionary isn't empty, set the associated PDF key to the appropriate value
        if !xobjects_dictionary.is_empty() {
            dictionary.set("XObject", lopdf::Object::Dictionary(xobjects_dictionary));
        }

        dictionary
    }
}

/// The representation of a PDF page. Utility functions are implemented for this struct
/// so that its content can be inserted into the underlying PDF document.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f64,
    /// Page height in points.
    pub height: f64,
    /// Page layers.
    pub layers: Vec<PdfLayer>,
    /// Resources used in this page.
    pub(crate) resources: PdfResources,
}

impl PdfPage {
    /// Iterates over all the layers in order to construct the dictionary for the PDF resources
    /// and the PDF streams contained into the page so that they can be inserted in to the document.
    /// Returns the dictionary of the resources and the vector containing all the streams associated
    /// to the layers.
    pub(crate) fn collect_resources_and_streams(
        &mut self,
        inner_document: &mut lopdf::Document,
    ) -> (lopdf::Dictionary, Vec<lopdf::Stream>) {
        // Collect the resources dictionary from the resources of the page,
        // simultaneously inserting them into the PDF document
        let resource_dictionary = self.resources.with_document(inner_document);

        let mut layer_streams = Vec::<lopdf::Stream>::new();
        use lopdf::content::Operation;

        for layer in self.layers.iter_mut() {
            // In the PDF specification the q/Q operator pair creates an isolated graphics
            // state block, so each layer is wrapped into one to keep its state to itself
            layer.operations.insert(0, Operation::new("q", vec![]));
            layer.operations.push(Operation::new("Q", vec![]));

            let layer_stream = layer.clone().into();
            layer_streams.push(layer_stream);
        }

        (resource_dictionary, layer_streams)
    }
}

/// Converts millimeters to points. This function is used in order to present the data
/// in the format required by the PDF specification, while the end user works in
/// millimeters which are easier to reason about.
fn millimeters_to_points(millimeters: f64) -> f64 {
    millimeters * 2.834646
}

/// The width of the stroked separator lines, expressed in millimeters.
const LINE_WIDTH_IN_MILLIMETERS: f64 = 0.2;

/// This struct represents the actual PDF document on a high-level. It is an interface to the
/// underlying `lopdf::Document` with the addition of the PDF pages, the document identifier and
/// the core faces referenced by the document.
///
/// Various convenience functions are exposed for this struct, such as `add_page_with_layer`,
/// `write_text_to_layer_in_page`, `draw_filled_rectangle_in_page`, `draw_line_in_page`,
/// `place_image_in_page` and `save_to_bytes`, which together cover everything the invoice
/// layout needs to put on a page.
pub struct PdfDocument {
    /// The association between the face identifiers, the objects they are represented by and the faces.
    fonts: BTreeMap<String, (lopdf::ObjectId, CoreFont)>,
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly
    /// interacted with unless strictly necessary, anyway this is why it is exposed to the user.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used in order to set the PDF `ID` tag.
    pub identifier: String,
    /// The pages of the PDF document.
    pub(crate) pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier. Both core faces
    /// are registered up front because every invoice uses the two of them.
    pub fn new(pdf_document_identifier: String) -> Self {
        let mut inner_document = lopdf::Document::with_version("1.5");

        let mut fonts = BTreeMap::default();
        for core_font in [CoreFont::Helvetica, CoreFont::HelveticaBold] {
            let font_object_id = inner_document.new_object_id();
            fonts.insert(
                core_font.face_identifier().to_string(),
                (font_object_id, core_font),
            );
        }

        PdfDocument {
            fonts,
            inner_document,
            identifier: pdf_document_identifier,
            pages: Vec::new(),
        }
    }

    /// Adds a page of given width and height in millimeters with an empty layer for contents
    /// to be added to. The function returns the index of the page and of the layer in the page,
    /// these are to be passed to the other functions when calling them, such as to
    /// `write_text_to_layer_in_page`. The reason why we work with indices is because it notably
    /// simplifies the handling of the pages and the layers.
    pub fn add_page_with_layer(&mut self, page_width: f64, page_height: f64) -> (usize, usize) {
        // Creates a new PDF page
        let mut pdf_page = PdfPage {
            width: millimeters_to_points(page_width), // Convert millimeters to points because this is what `lopdf` expects
            height: millimeters_to_points(page_height),
            layers: Vec::new(), // The layer will be later added
            resources: PdfResources::default(),
        };

        // Create a new PDF layer with a pre-given name and then append it to the current page
        let pdf_layer = PdfLayer {
            name: "Layer0".into(),
            operations: Vec::new(),
        };
        pdf_page.layers.push(pdf_layer);
        self.pages.push(pdf_page);

        let page_index = self.pages.len() - 1;
        let layer_index_in_page = 0;
        // Return the page and layer in page indices
        (page_index, layer_index_in_page)
    }

    /// Writes the text in the specified weight and color to the PDF document, anchored at the
    /// given position. The position is expressed in millimeters from the top left corner of the
    /// page and addresses the text baseline; which side of the text sits on the anchor is
    /// decided by the alignment. The information is inserted onto the given layer of the
    /// specified page (refer to the other functions documentation for more details).
    ///
    /// Characters which cannot be encoded for the core faces are logged and skipped, both here
    /// and in the width measurement the alignment relies on, so the two always agree.
    #[allow(clippy::too_many_arguments)]
    pub fn write_text_to_layer_in_page(
        &mut self,
        page_index: usize,
        layer_index: usize,
        color: [f64; 3],
        text: String,
        font_weight: FontWeight,
        font_size: f64,
        alignment: TextAlignment,
        position: [f64; 2],
    ) -> Result<(), ContextError> {
        let core_font = CoreFont::for_weight(font_weight);
        let page_height = self.get_page(page_index)?.height;

        // Resolve the anchor into the position of the first glyph, measuring the
        // text with the core metrics of the selected face
        let text_width = core_font.text_width_in_points(&text, font_size);
        let [x, y] = position;
        let anchored_x = match alignment {
            TextAlignment::Left => millimeters_to_points(x),
            TextAlignment::Center => millimeters_to_points(x) - text_width / 2.0,
            TextAlignment::Right => millimeters_to_points(x) - text_width,
        };
        // The PDF origin sits at the bottom left corner, so the vertical coordinate is flipped
        let baseline_y = page_height - millimeters_to_points(y);

        // Normalize the text in the NFC form before processing, then encode each
        // character into the single-byte encoding declared for the faces
        let mut encoded_bytes = Vec::<u8>::new();
        for character in text.nfc() {
            if let Some(byte) = encode_win_ansi(character) {
                encoded_bytes.push(byte);
            } else {
                // If the character is not representable, log the event and skip it
                log::warn!(
                    "Unable to encode the character {:?} for the face {:?}, skipping it",
                    character,
                    core_font.base_font_name()
                );
            }
        }

        self.add_operations_to_layer_in_page(
            layer_index,
            page_index,
            vec![
                lopdf::content::Operation::new("BT", vec![]), // Begin text section
                lopdf::content::Operation::new(
                    "Tf",
                    vec![
                        core_font.face_identifier().into(),
                        (font_size as f32).into(),
                    ],
                ), // Set the font and the font size
                lopdf::content::Operation::new(
                    "Td",
                    vec![(anchored_x as f32).into(), (baseline_y as f32).into()],
                ), // Set the position where the text begins to be written
                lopdf::content::Operation::new("rg", {
                    let [r, g, b] = color;
                    vec![r, g, b]
                        .into_iter()
                        .map(|component| lopdf::Object::Real(component as f32))
                        .collect()
                }), // Set the filling color of the text
                lopdf::content::Operation::new(
                    "Tj",
                    vec![lopdf::Object::String(
                        encoded_bytes,
                        StringFormat::Hexadecimal,
                    )],
                ), // Insert the actual text content as bytes
                lopdf::content::Operation::new("ET", vec![]), // End text section
            ],
        )?;

        Ok(())
    }

    /// Fills an axis-aligned rectangle with the given color. The position addresses the top
    /// left corner of the rectangle in millimeters from the top left corner of the page.
    pub fn draw_filled_rectangle_in_page(
        &mut self,
        page_index: usize,
        layer_index: usize,
        color: [f64; 3],
        position: [f64; 2],
        size: [f64; 2],
    ) -> Result<(), ContextError> {
        let page_height = self.get_page(page_index)?.height;

        let [x, y] = position;
        let [width, height] = size;
        // The rectangle operator wants the lower left corner, so the vertical
        // coordinate is flipped and offset by the height of the rectangle
        let lower_left_x = millimeters_to_points(x);
        let lower_left_y = page_height - millimeters_to_points(y + height);

        self.add_operations_to_layer_in_page(
            layer_index,
            page_index,
            vec![
                lopdf::content::Operation::new("q", vec![]),
                lopdf::content::Operation::new("rg", {
                    let [r, g, b] = color;
                    vec![r, g, b]
                        .into_iter()
                        .map(|component| lopdf::Object::Real(component as f32))
                        .collect()
                }), // Set the filling color of the rectangle
                lopdf::content::Operation::new(
                    "re",
                    vec![
                        (lower_left_x as f32).into(),
                        (lower_left_y as f32).into(),
                        (millimeters_to_points(width) as f32).into(),
                        (millimeters_to_points(height) as f32).into(),
                    ],
                ), // Append the rectangle to the current path
                lopdf::content::Operation::new("f", vec![]), // Fill the path
                lopdf::content::Operation::new("Q", vec![]),
            ],
        )?;

        Ok(())
    }

    /// Strokes a straight line between the two given positions, both expressed in millimeters
    /// from the top left corner of the page.
    pub fn draw_line_in_page(
        &mut self,
        page_index: usize,
        layer_index: usize,
        color: [f64; 3],
        from: [f64; 2],
        to: [f64; 2],
    ) -> Result<(), ContextError> {
        let page_height = self.get_page(page_index)?.height;

        let [from_x, from_y] = from;
        let [to_x, to_y] = to;

        self.add_operations_to_layer_in_page(
            layer_index,
            page_index,
            vec![
                lopdf::content::Operation::new("q", vec![]),
                lopdf::content::Operation::new("RG", {
                    let [r, g, b] = color;
                    vec![r, g, b]
                        .into_iter()
                        .map(|component| lopdf::Object::Real(component as f32))
                        .collect()
                }), // Set the stroking color of the line
                lopdf::content::Operation::new(
                    "w",
                    vec![(millimeters_to_points(LINE_WIDTH_IN_MILLIMETERS) as f32).into()],
                ), // Set the line width
                lopdf::content::Operation::new(
                    "m",
                    vec![
                        (millimeters_to_points(from_x) as f32).into(),
                        ((page_height - millimeters_to_points(from_y)) as f32).into(),
                    ],
                ), // Move to the beginning of the line
                lopdf::content::Operation::new(
                    "l",
                    vec![
                        (millimeters_to_points(to_x) as f32).into(),
                        ((page_height - millimeters_to_points(to_y)) as f32).into(),
                    ],
                ), // Append the straight segment to the current path
                lopdf::content::Operation::new("S", vec![]), // Stroke the path
                lopdf::content::Operation::new("Q", vec![]),
            ],
        )?;

        Ok(())
    }

    /// Places the image found at the given path onto the page, scaled to the given size. The
    /// position addresses the top left corner of the placed image in millimeters from the top
    /// left corner of the page. The image becomes an `XObject` of the page resources and the
    /// layer only references it, as the PDF specification wants.
    pub fn place_image_in_page(
        &mut self,
        page_index: usize,
        layer_index: usize,
        image_path: &Path,
        position: [f64; 2],
        size: [f64; 2],
    ) -> Result<(), ContextError> {
        let image_xobject = ImageXObject::from_file(image_path)?;

        let pdf_page = self
            .pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))?;
        let page_height = pdf_page.height;
        let xobject_reference = pdf_page
            .resources
            .xobjects
            .add_xobject(XObject::Image(image_xobject));

        let [x, y] = position;
        let [width, height] = size;
        // The current transformation matrix maps the image unit square onto the target
        // rectangle, whose lower left corner is expected by the PDF specification
        let lower_left_x = millimeters_to_points(x);
        let lower_left_y = page_height - millimeters_to_points(y + height);

        self.add_operations_to_layer_in_page(
            layer_index,
            page_index,
            vec![
                lopdf::content::Operation::new("q", vec![]),
                lopdf::content::Operation::new(
                    "cm",
                    vec![
                        (millimeters_to_points(width) as f32).into(),
                        0.into(),
                        0.into(),
                        (millimeters_to_points(height) as f32).into(),
                        (lower_left_x as f32).into(),
                        (lower_left_y as f32).into(),
                    ],
                ), // Scale and translate the image unit square onto the page
                lopdf::content::Operation::new(
                    "Do",
                    vec![lopdf::Object::Name(xobject_reference.0.into_bytes())],
                ), // Paint the referenced image
                lopdf::content::Operation::new("Q", vec![]),
            ],
        )?;

        Ok(())
    }

    /// Write the operations so far specified to the underlying PDF document and finalize it.
    ///
    /// # Disclaimer
    ///
    /// One mandatory argument needed by the PDF specification is the instance ID. The creation
    /// and modification dates are pinned to the Unix epoch on purpose: rendering the same
    /// document twice must produce the same bytes, and wall clock timestamps would defeat that.
    pub fn write_all(&mut self, instance_id: String) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        // Construct all the general info that the PDF document needs in order to be parsed
        // correctly and insert it into the PDF document itself
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            (
                "CreationDate",
                String(
                    to_pdf_timestamp_format(&OffsetDateTime::UNIX_EPOCH).into_bytes(),
                    Literal,
                ),
            ),
            (
                "ModDate",
                String(
                    to_pdf_timestamp_format(&OffsetDateTime::UNIX_EPOCH).into_bytes(),
                    Literal,
                ),
            ),
            (
                "Title",
                String(self.identifier.clone().into_bytes(), Literal),
            ),
            (
                "Creator",
                String("invoicr".to_string().into_bytes(), Literal),
            ),
            (
                "Producer",
                String("invoicr".to_string().into_bytes(), Literal),
            ),
            (
                "Identifier",
                String(self.identifier.clone().into_bytes(), Literal),
            ),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        // Construct the catalog, required by the PDF specification
        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Reference(pages_id)),
        ]);

        // Begin constructing the pages dictionary
        let mut pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Integer(self.pages.len() as i64)),
        ]);

        // Save the catalog after inserting it into the PDF document
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.into_bytes(), Literal),
            ]),
        );

        // Load the registered faces and insert them into the PDF document
        let fonts_dictionary = self.insert_fonts_into_document();
        let fonts_dictionary_id = self.inner_document.add_object(fonts_dictionary);

        let mut page_ids = Vec::<lopdf::Object>::new();

        // For each page present in the document...
        for page in self.pages.iter_mut() {
            // Construct the dictionary which specifies all the page information
            let mut page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Integer(0)),
                (
                    "MediaBox",
                    vec![
                        0.into(),
                        0.into(),
                        (page.width as f32).into(),
                        (page.height as f32).into(),
                    ]
                    .into(),
                ),
                (
                    "TrimBox",
                    vec![
                        0.into(),
                        0.into(),
                        (page.width as f32).into(),
                        (page.height as f32).into(),
                    ]
                    .into(),
                ),
                (
                    "CropBox",
                    vec![
                        0.into(),
                        0.into(),
                        (page.width as f32).into(),
                        (page.height as f32).into(),
                    ]
                    .into(),
                ),
                ("Annots", vec![].into()),
                ("Parent", Reference(pages_id)),
            ]);

            // Collect the streams and the resources associated to the page, which
            // inserts the referenced objects into the PDF document as a side effect
            let (mut resource_dictionary, layer_streams) =
                page.collect_resources_and_streams(&mut self.inner_document);

            // Set the faces for the resources of the page, insert them into the PDF document
            // and then insert the resource dictionary into the one for the pages
            resource_dictionary.set("Font", Reference(fonts_dictionary_id));
            let resources_page_id = self
                .inner_document
                .add_object(Dictionary(resource_dictionary));
            page_dictionary.set("Resources", Reference(resources_page_id));

            // Merge all streams of the individual layers into one unified stream, then insert
            // it into the PDF document as a whole by setting the "Contents" field
            let mut merged_layer_streams = Vec::<u8>::new();
            for mut stream in layer_streams {
                merged_layer_streams.append(&mut stream.content);
            }
            let merged_layer_stream =
                lopdf::Stream::new(lopdf::Dictionary::new(), merged_layer_streams);
            let page_content_id = self.inner_document.add_object(merged_layer_stream);
            page_dictionary.set("Contents", Reference(page_content_id));

            // Inserts the page dictionary into the document and save the associated reference
            let page_id = self.inner_document.add_object(page_dictionary);
            page_ids.push(Reference(page_id))
        }

        // Use all the collected page references in order to set the "Kids" field of the PDF
        // document and then insert the pages dictionary into the document itself as a last operation
        pages.set::<_, lopdf::Object>("Kids".to_string(), page_ids.into());
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        Ok(())
    }

    /// Optimize the PDF document (only superficially).
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.delete_zero_length_streams();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Converts the registered faces into a dictionary and inserts them into the document.
    /// The core faces only need their name and encoding declared, there is no font program
    /// to embed.
    fn insert_fonts_into_document(&mut self) -> lopdf::Dictionary {
        use lopdf::Object::*;

        let mut font_dictionary = lopdf::Dictionary::new();

        for (face_identifier, (font_object_id, core_font)) in self.fonts.iter() {
            let collected_font_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", Name("Font".into())),
                ("Subtype", Name("Type1".into())),
                ("BaseFont", Name(core_font.base_font_name().into())),
                ("Encoding", Name("WinAnsiEncoding".into())),
            ]);

            self.inner_document.objects.insert(
                *font_object_id,
                lopdf::Object::Dictionary(collected_font_dictionary),
            );
            font_dictionary.set(face_identifier.clone(), Reference(*font_object_id));
        }
        font_dictionary
    }

    /// This function is responsible for adding the given operations to the specified layer and page.
    fn add_operations_to_layer_in_page(
        &mut self,
        layer_index: usize,
        page_index: usize,
        operations: Vec<lopdf::content::Operation>,
    ) -> Result<(), ContextError> {
        let pdf_layer_reference = self.get_mut_layer_in_page(layer_index, page_index)?;
        pdf_layer_reference.operations.extend(operations);

        Ok(())
    }

    // Retrieve the page at the given index.
    fn get_page(&self, page_index: usize) -> Result<&PdfPage, ContextError> {
        self.pages
            .get(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))
    }

    // Retrieve the specified layer in the given page via the respective indices.
    fn get_mut_layer_in_page(
        &mut self,
        layer_index: usize,
        page_index: usize,
    ) -> Result<&mut PdfLayer, ContextError> {
        let pdf_page = self
            .pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))?;
        let pdf_layer = pdf_page
            .layers
            .get_mut(layer_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the layer with index {}",
                layer_index
            )))?;

        Ok(pdf_layer)
    }
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_core_metrics_measure_text_like_the_reference_tables() {
        // "Total:" in Helvetica: T 611, o 556, t 278, a 556, l 222, colon 278
        let width = CoreFont::Helvetica.text_width_in_points("Total:", 1000.0);
        assert_eq!(width, 2501.0);

        // The bold face is wider for the same text
        let bold_width = CoreFont::HelveticaBold.text_width_in_points("Total:", 1000.0);
        assert!(bold_width > width);
    }

    #[test]
    fn the_width_measurement_scales_linearly_with_the_font_size() {
        let at_ten = CoreFont::Helvetica.text_width_in_points("Balance Due:", 10.0);
        let at_twenty = CoreFont::Helvetica.text_width_in_points("Balance Due:", 20.0);
        assert!((at_twenty - 2.0 * at_ten).abs() < 1.0e-9);
    }

    #[test]
    fn the_pound_sign_is_measurable_and_encodable() {
        assert_eq!(CoreFont::Helvetica.advance_width('£'), Some(556));
        assert_eq!(encode_win_ansi('£'), Some(0xA3));
    }

    #[test]
    fn latin_1_characters_encode_to_their_own_code_points() {
        assert_eq!(encode_win_ansi('é'), Some(0xE9));
        assert_eq!(encode_win_ansi('ü'), Some(0xFC));
        assert_eq!(encode_win_ansi('¿'), Some(0xBF));
        assert_eq!(encode_win_ansi('\u{00A0}'), Some(0xA0));
        assert_eq!(encode_win_ansi('ÿ'), Some(0xFF));
    }

    #[test]
    fn accented_names_measure_as_wide_as_their_plain_forms() {
        // é and e share the 556 advance in both faces
        for font in [CoreFont::Helvetica, CoreFont::HelveticaBold] {
            assert_eq!(font.advance_width('é'), font.advance_width('e'));
            assert_eq!(font.advance_width('ñ'), font.advance_width('n'));
            assert!(
                font.text_width_in_points("José", 12.0) > font.text_width_in_points("Jos", 12.0)
            );
            assert_eq!(
                font.text_width_in_points("José", 12.0),
                font.text_width_in_points("Jose", 12.0)
            );
        }
    }

    #[test]
    fn characters_outside_the_encoding_are_skipped_in_measurement() {
        let with_ideograph = CoreFont::Helvetica.text_width_in_points("a\u{4E16}b", 10.0);
        let without_ideograph = CoreFont::Helvetica.text_width_in_points("ab", 10.0);
        assert_eq!(with_ideograph, without_ideograph);
    }

    #[test]
    fn millimeters_convert_to_points_with_the_usual_factor() {
        assert!((millimeters_to_points(10.0) - 28.34646).abs() < 1.0e-9);
    }

    #[test]
    fn pdf_timestamps_carry_the_d_prefix_and_the_offset() {
        assert_eq!(
            to_pdf_timestamp_format(&OffsetDateTime::UNIX_EPOCH),
            "D:19700101000000+00'00'"
        );
    }

    #[test]
    fn pages_are_created_in_points_with_a_single_layer() {
        let mut pdf_document = PdfDocument::new("test-document".to_string());
        let (page_index, layer_index) = pdf_document.add_page_with_layer(216.04, 279.39);
        assert_eq!((page_index, layer_index), (0, 0));

        let page = &pdf_document.pages[page_index];
        assert!((page.width - 612.39692184).abs() < 1.0e-6);
        assert!((page.height - 791.97174594).abs() < 1.0e-6);
        assert_eq!(page.layers.len(), 1);
    }
}
